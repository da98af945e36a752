use serde::{Deserialize, Serialize};

/// What kind of file an uploaded artifact is.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Document,
    Other,
}

/// Reference to an uploaded proof (a bank transfer receipt, an ID photo).
///
/// The bytes live with the transport; the desk only sees the reference,
/// what kind of file it is, and how big it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    reference: String,
    media: MediaKind,
    size: u64,
}

impl Artifact {
    pub fn new(reference: impl Into<String>, media: MediaKind, size: u64) -> Self {
        Self {
            reference: reference.into(),
            media,
            size,
        }
    }

    pub fn image(reference: impl Into<String>, size: u64) -> Self {
        Self::new(reference, MediaKind::Image, size)
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn media(&self) -> MediaKind {
        self.media
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_image(&self) -> bool {
        self.media == MediaKind::Image
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?}, {} bytes)", self.reference, self.media, self.size)
    }
}
