//! Payload sources for simulated drones.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{Error, Result};
use crate::logic::model::sniff_image;

/// Produces the bytes of the next record a source inserts
pub trait PayloadSource: Send + Sync {
    fn next_payload(&self) -> Vec<u8>;
}

/// Random pick among the sample images found in a directory
pub struct ImageDirectory {
    root: PathBuf,
    images: Vec<Vec<u8>>,
}

impl ImageDirectory {
    /// Load every JPEG, PNG or GIF directly under `root`
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let entries = std::fs::read_dir(&root)
            .map_err(|e| Error::Config(format!("cannot read image directory {}: {}", root.display(), e)))?;

        let mut images = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match std::fs::read(&path) {
                Ok(bytes) if sniff_image(&bytes).is_some() => images.push(bytes),
                Ok(_) => log::debug!("Skipping {}: not a recognised image", path.display()),
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            }
        }

        if images.is_empty() {
            return Err(Error::Config(format!("no sample images in {}", root.display())));
        }

        log::info!("Loaded {} sample images from {}", images.len(), root.display());
        Ok(Self { root, images })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl PayloadSource for ImageDirectory {
    fn next_payload(&self) -> Vec<u8> {
        self.images
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default()
    }
}

/// JPEG-framed random bytes, for runs without sample images
pub struct SyntheticImages {
    body_len: usize,
}

impl SyntheticImages {
    pub fn new(body_len: usize) -> Self {
        Self { body_len }
    }
}

impl Default for SyntheticImages {
    fn default() -> Self {
        Self::new(2048)
    }
}

impl PayloadSource for SyntheticImages {
    fn next_payload(&self) -> Vec<u8> {
        let mut rng = rand::thread_rng();
        let mut bytes = Vec::with_capacity(self.body_len + 6);
        bytes.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
        bytes.extend((0..self.body_len).map(|_| rng.gen::<u8>()));
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }
}
