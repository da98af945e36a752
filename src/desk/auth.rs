use std::collections::HashSet;

use crate::desk::error::DeskError;
use crate::desk::user::UserId;

/// The privileged identity set. Built once from configuration and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminGate {
    admins: HashSet<UserId>,
}

impl AdminGate {
    pub fn new(admins: impl IntoIterator<Item = UserId>) -> Self {
        let admins: HashSet<UserId> = admins.into_iter().collect();
        log::debug!("Admin gate loaded with {} identities", admins.len());
        Self { admins }
    }

    pub fn is_admin(&self, identity: UserId) -> bool {
        self.admins.contains(&identity)
    }

    /// Short-circuits with `Unauthorized` for anyone outside the set.
    pub fn authorize(&self, identity: UserId) -> Result<(), DeskError> {
        if self.is_admin(identity) {
            Ok(())
        } else {
            log::warn!("Rejected admin action from {identity}");
            Err(DeskError::Unauthorized { actor: identity })
        }
    }

    /// Admin identities in ascending order, for fan-out
    pub fn identities(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.admins.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.admins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.admins.is_empty()
    }
}
