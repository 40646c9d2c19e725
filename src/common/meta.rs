//! Project metadata descriptor (`meta.json`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{Error, Result};

/// File name of the descriptor inside the client directory
pub const META_FILE: &str = "meta.json";

/// Static description of the project under test
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Meta {
    /// Highest step index to execute
    pub stage: usize,
    /// Executable name, relative to `executable_dir`
    pub entrypoint: String,
    /// Directory holding the client executable and `meta.json`
    #[serde(rename = "path")]
    pub executable_dir: PathBuf,
    /// Project the run is reported against
    pub project_id: String,
}

impl Meta {
    /// Load `meta.json` from `dir`
    ///
    /// `executable_dir` is always set to `dir`, whatever the file says.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(META_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        let mut meta: Meta = serde_json::from_str(&content)
            .map_err(|e| Error::ConfigParse(format!("{}: {}", path.display(), e)))?;
        meta.executable_dir = dir.to_path_buf();
        Ok(meta)
    }

    /// Full path of the executable under test
    pub fn executable_path(&self) -> PathBuf {
        self.executable_dir.join(&self.entrypoint)
    }
}
