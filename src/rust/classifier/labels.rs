use std::fs;
use std::path::Path;

use super::error::ClassifierError;

/// Raw label strings, index-aligned with the network's output vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<impl Into<String>>) -> Self {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// One label per line, line order = output index order.
    pub fn parse(text: &str) -> Self {
        Self::new(text.lines().collect())
    }

    pub fn from_file(path: &Path) -> Result<Self, ClassifierError> {
        let bytes = fs::read(path).map_err(|e| {
            ClassifierError::LabelError(format!("Unable to open labels file {}: {}", path.display(), e))
        })?;
        Ok(Self::parse(&String::from_utf8_lossy(&bytes)))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}
