use serde::{Deserialize, Serialize};

use crate::desk::error::ValidationError;

/// External identity handle (the chat platform's user id).
pub type UserId = i64;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Country {
    Iran,
    Turkey,
}

impl std::fmt::Display for Country {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Country::Iran => write!(f, "Iran"),
            Country::Turkey => write!(f, "Turkey"),
        }
    }
}

/// Registration details as collected by the conversation layer.
#[derive(Debug, Deserialize, Clone)]
pub struct Registration {
    pub id: UserId,
    pub name: String,
    pub family_name: String,
    pub country: Country,
    pub phone: String,
    /// Only honoured when seeding from an existing roster
    #[serde(default)]
    pub verified: bool,
    /// Reference to the uploaded ID photo
    #[serde(default)]
    pub id_document: Option<String>,
}

/// A registered user of the desk.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    id: UserId,
    name: String,
    family_name: String,
    country: Country,
    phone: String,
    verified: bool,
    id_document: Option<String>,
    removed: bool,
}

impl User {
    /// A fresh sign-up. Always unverified, whatever the registration claims.
    pub(crate) fn register(registration: Registration) -> Self {
        Self {
            verified: false,
            ..Self::seed(registration)
        }
    }

    /// A user carried over from an existing roster, verification included.
    pub(crate) fn seed(registration: Registration) -> Self {
        Self {
            id: registration.id,
            name: registration.name,
            family_name: registration.family_name,
            country: registration.country,
            phone: registration.phone,
            verified: registration.verified,
            id_document: registration.id_document,
            removed: false,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.name, self.family_name)
    }

    pub fn country(&self) -> Country {
        self.country
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn id_document(&self) -> Option<&str> {
        self.id_document.as_deref()
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Verified and still active: allowed to open transactions.
    pub fn can_trade(&self) -> bool {
        self.verified && !self.removed
    }

    pub(crate) fn verify(&mut self) -> Result<(), ValidationError> {
        self.ensure_active()?;
        self.verified = true;
        Ok(())
    }

    pub(crate) fn remove(&mut self) -> Result<(), ValidationError> {
        self.ensure_active()?;
        self.removed = true;
        self.verified = false;
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), ValidationError> {
        if self.removed {
            return Err(ValidationError::UserRemoved { user: self.id });
        }
        Ok(())
    }
}
