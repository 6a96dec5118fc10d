//! Data models for dh

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A named directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bookmark {
    /// User-chosen name
    pub key: String,
    /// Absolute directory path
    pub path: PathBuf,
}

impl Bookmark {
    pub fn new(key: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            key: key.into(),
            path: path.into(),
        }
    }
}
