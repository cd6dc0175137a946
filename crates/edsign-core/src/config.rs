use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EdsignError, EdsignResult};
use crate::types::{DEFAULT_COMMENT, DEFAULT_KDF_ROUNDS};

/// User defaults (loaded from config.toml). Command-line flags take precedence.
///
/// The trusted public-key directory is intentionally absent: it is fixed at
/// [`crate::types::TRUSTED_KEY_DIR`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EdsignConfig {
    pub keygen: KeygenConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeygenConfig {
    /// Comment prefix for generated keys (default: "signify")
    pub comment: String,
    /// bcrypt-pbkdf rounds for passphrase-protected keys (default: 42)
    pub kdf_rounds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for KeygenConfig {
    fn default() -> Self {
        Self {
            comment: DEFAULT_COMMENT.into(),
            kdf_rounds: DEFAULT_KDF_ROUNDS,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl EdsignConfig {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> EdsignResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| EdsignError::file(path, e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| EdsignError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would weaken key protection.
    ///
    /// An unprotected key must be requested explicitly on the command line,
    /// so `kdf_rounds = 0` is not a valid default.
    pub fn validate(&self) -> EdsignResult<()> {
        if self.keygen.kdf_rounds == 0 {
            return Err(EdsignError::Config(
                "keygen.kdf_rounds must be at least 1 (use -n for an unprotected key)".into(),
            ));
        }
        Ok(())
    }

    /// `~/.config/edsign/config.toml`, or `None` when `HOME` is unset.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(|home| PathBuf::from(home).join(".config/edsign/config.toml"))
    }
}
