//! Inference Engine - digest classifier
//!
//! Stand-in model used when no real network is wired in: the payload must be
//! a recognisable image, and the label is a SHA-256 digest of the bytes
//! folded onto the vocabulary. Deterministic, so the same image always maps
//! to the same category.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{Classifier, Label, Vocabulary};
use crate::error::{Error, Result};

/// Image container detected from magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
}

impl ImageKind {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
        }
    }
}

/// Detect the image container from the first bytes
pub fn sniff_image(payload: &[u8]) -> Option<ImageKind> {
    match payload {
        [0xFF, 0xD8, 0xFF, ..] => Some(ImageKind::Jpeg),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(ImageKind::Png),
        [b'G', b'I', b'F', b'8', ..] => Some(ImageKind::Gif),
        _ => None,
    }
}

/// Engine status for the viewing layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub model_name: String,
    pub categories: usize,
    pub avg_latency_ms: f32,
    pub inference_count: u64,
}

pub struct DigestClassifier {
    vocabulary: Vocabulary,
    latency_sum_us: AtomicU64,
    inference_count: AtomicU64,
}

impl DigestClassifier {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self {
            vocabulary,
            latency_sum_us: AtomicU64::new(0),
            inference_count: AtomicU64::new(0),
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn status(&self) -> EngineStatus {
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.inference_count.load(Ordering::Relaxed);
        let avg = if count > 0 { (sum as f32 / count as f32) / 1000.0 } else { 0.0 };

        EngineStatus {
            model_name: self.name().to_string(),
            categories: self.vocabulary.len(),
            avg_latency_ms: avg,
            inference_count: count,
        }
    }
}

impl Default for DigestClassifier {
    fn default() -> Self {
        Self::new(Vocabulary::default())
    }
}

impl Classifier for DigestClassifier {
    fn classify(&self, payload: &[u8]) -> Result<Label> {
        let started = Instant::now();

        if payload.is_empty() {
            return Err(Error::MalformedPayload("empty payload".into()));
        }
        if sniff_image(payload).is_none() {
            return Err(Error::MalformedPayload(format!(
                "unrecognised image header ({} bytes)",
                payload.len()
            )));
        }

        let digest = Sha256::digest(payload);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let label = Label((u64::from_be_bytes(head) % self.vocabulary.len() as u64) as u32);

        self.latency_sum_us
            .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);
        self.inference_count.fetch_add(1, Ordering::Relaxed);

        Ok(label)
    }

    fn category(&self, label: Label) -> Option<String> {
        self.vocabulary.category(label).map(String::from)
    }

    fn name(&self) -> &str {
        "digest"
    }
}
