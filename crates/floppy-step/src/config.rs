use serde::Deserialize;

use crate::{Error, Result};

/// Floppy settings for one build.
///
/// `floppy_files` and `floppy_dirs` feed the image generator that runs
/// before this step; the step itself only reads `floppy_img_path`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FloppyConfig {
    pub floppy_img_path: Option<String>,
    pub floppy_files: Vec<String>,
    pub floppy_dirs: Vec<String>,
}

impl FloppyConfig {
    /// Load from env vars:
    ///
    /// - `FLOPPY_IMG_PATH` (optional, datastore path of an existing image)
    /// - `FLOPPY_FILES` (comma-separated, optional)
    /// - `FLOPPY_DIRS` (comma-separated, optional)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            floppy_img_path: lookup("FLOPPY_IMG_PATH").filter(|p| !p.is_empty()),
            floppy_files: split_list(lookup("FLOPPY_FILES")),
            floppy_dirs: split_list(lookup("FLOPPY_DIRS")),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.floppy_img_path
            && path.trim().is_empty()
        {
            return Err(Error::InvalidConfig("floppy_img_path is empty".into()));
        }
        if self.floppy_files.iter().any(|f| f.trim().is_empty()) {
            return Err(Error::InvalidConfig("floppy_files has an empty entry".into()));
        }
        if self.floppy_dirs.iter().any(|d| d.trim().is_empty()) {
            return Err(Error::InvalidConfig("floppy_dirs has an empty entry".into()));
        }
        Ok(())
    }

    /// Whether an earlier step is expected to generate an image.
    pub fn wants_generated_image(&self) -> bool {
        !self.floppy_files.is_empty() || !self.floppy_dirs.is_empty()
    }
}

pub(crate) fn split_list(raw: Option<String>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
