//! Configuration loading and management
//!
//! Handles parsing of `.punchlist/config.toml`, the per-scope settings file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Per-scope configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Next id handed out on task creation
    #[serde(default = "default_next_id")]
    pub next_id: u32,

    /// Zero-padding width for new filenames
    #[serde(default = "default_id_width")]
    pub id_width: usize,

    /// State order used by `ls`
    #[serde(default = "default_ls_state_order")]
    pub ls_state_order: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            next_id: default_next_id(),
            id_width: default_id_width(),
            ls_state_order: default_ls_state_order(),
        }
    }
}

fn default_next_id() -> u32 {
    1
}

pub fn default_id_width() -> usize {
    3
}

pub fn default_ls_state_order() -> Vec<String> {
    ["BEGUN", "BLOCK", "TODO", "CONFIRM", "DONE", "NOTDO"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Widest padding that still makes sense for a `u32` id
const MAX_ID_WIDTH: usize = 10;

impl ScopeConfig {
    /// Load configuration from a `config.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        let config: ScopeConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, or return defaults when the file is missing.
    ///
    /// A present but invalid file is an error: silently resetting `next_id`
    /// would hand out ids that already exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let content = toml::to_string_pretty(self)?;
        crate::store::write_atomic(path, content.as_bytes())
    }

    /// Take the next id and advance the counter
    pub fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        id
    }

    fn validate(&self) -> Result<()> {
        if self.next_id == 0 {
            return Err(Error::InvalidConfig("next_id must be >= 1".to_string()));
        }
        if self.id_width == 0 || self.id_width > MAX_ID_WIDTH {
            return Err(Error::InvalidConfig(format!(
                "id_width must be between 1 and {MAX_ID_WIDTH}"
            )));
        }
        for label in &self.ls_state_order {
            if label.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "ls_state_order cannot include empty entries".to_string(),
                ));
            }
        }
        Ok(())
    }
}
