//! Fixed label -> category lookup.

use std::path::Path;

use super::Label;
use crate::error::{Error, Result};

/// Categories used when no vocabulary file is configured
const BUILTIN_CATEGORIES: &[&str] = &[
    "airliner",
    "warplane",
    "airship",
    "balloon",
    "parachute",
    "kite",
    "pickup truck",
    "container ship",
    "lakeside",
    "valley",
    "seashore",
    "volcano",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    categories: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            categories: BUILTIN_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Vocabulary {
    pub fn new(categories: Vec<String>) -> Result<Self> {
        if categories.is_empty() {
            return Err(Error::Config("vocabulary has no categories".into()));
        }
        Ok(Self { categories })
    }

    /// One category per line; blank lines and `#` comments are skipped
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read vocabulary {}: {}", path.display(), e)))?;

        let categories = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(String::from)
            .collect();

        let vocab = Self::new(categories)?;
        log::info!("Loaded {} categories from {}", vocab.len(), path.display());
        Ok(vocab)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn category(&self, label: Label) -> Option<&str> {
        self.categories.get(label.0 as usize).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_lookup() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.category(Label(0)), Some("airliner"));
        assert_eq!(vocab.category(Label(10_000)), None);
    }

    #[test]
    fn test_from_file_skips_comments() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# imagenet subset").unwrap();
        writeln!(file, "tench").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "goldfish").unwrap();

        let vocab = Vocabulary::from_file(file.path()).unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.category(Label(1)), Some("goldfish"));
    }

    #[test]
    fn test_empty_vocabulary_rejected() {
        assert!(matches!(Vocabulary::new(vec![]), Err(Error::Config(_))));
    }
}
