//! Model Module - classification seam
//!
//! The dispatcher only sees the `Classifier` trait. The concrete model is
//! loaded once at start-up and handed to the dispatcher as a shared handle,
//! so it can be swapped without touching the polling logic.

pub mod inference;
pub mod vocabulary;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use inference::{sniff_image, DigestClassifier, ImageKind};
pub use vocabulary::Vocabulary;

/// Integer class index produced by a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(pub u32);

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Synchronous, possibly CPU-heavy classifier.
///
/// Called from the blocking pool, never from an async worker directly.
pub trait Classifier: Send + Sync {
    fn classify(&self, payload: &[u8]) -> Result<Label>;

    /// Human-readable name for a label, if the model ships a vocabulary
    fn category(&self, _label: Label) -> Option<String> {
        None
    }

    /// Short identifier for logs and status output
    fn name(&self) -> &str;
}

pub type SharedClassifier = Arc<dyn Classifier>;
