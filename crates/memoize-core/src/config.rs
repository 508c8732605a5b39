//! Wrapper configuration.
//!
//! ```yaml
//! key: persistent-add
//! persistent: true
//! lazy: false
//! debug: false
//! folder: .memoize
//! digest: sha256
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MemoizeError, MemoizeResult};
use crate::key::{validate_key, KeyDigest};

/// Storage folder used when none is configured, relative to the working
/// directory at construction time.
pub const DEFAULT_FOLDER: &str = ".memoize";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MemoizeConfig {
    /// Explicit cache key. When set, every call shares this one key.
    pub key: Option<String>,

    /// Also store results as files in `folder`.
    pub persistent: bool,

    /// Evaluate lazy arguments before invoking the wrapped function.
    pub lazy: bool,

    /// Log key and source of every call at `info` level. The same triple is
    /// returned by `Memoized::call_traced` regardless of this flag.
    pub debug: bool,

    /// Storage folder for persisted entries.
    pub folder: PathBuf,

    /// Digest used for derived keys.
    pub digest: KeyDigest,
}

impl Default for MemoizeConfig {
    fn default() -> Self {
        Self {
            key: None,
            persistent: false,
            lazy: false,
            debug: false,
            folder: PathBuf::from(DEFAULT_FOLDER),
            digest: KeyDigest::default(),
        }
    }
}

impl MemoizeConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(content: &str) -> MemoizeResult<Self> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| MemoizeError::Config {
            message: format!("failed to parse config: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> MemoizeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| MemoizeError::Config {
            message: format!("failed to read {}: {}", path.display(), e),
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> MemoizeResult<()> {
        if let Some(key) = &self.key {
            validate_key(key)?;
        }
        if self.folder.as_os_str().is_empty() {
            return Err(MemoizeError::Config {
                message: "folder must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
