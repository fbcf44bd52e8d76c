//! Document fingerprints for change detection

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::document::Document;

/// SHA256 fingerprint of a serialized document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    pub fn from_text(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    /// Fingerprint of the document's YAML rendering
    pub fn from_document(document: &Document) -> Self {
        // Mapping order is part of the rendering, so reordering keys counts as a change
        let canonical = serde_yaml::to_string(document.as_value()).unwrap_or_default();
        Self::from_text(&canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn verify(&self, document: &Document) -> bool {
        *self == Self::from_document(document)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
