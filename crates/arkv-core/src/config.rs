use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ArkvError, ArkvResult};

/// Top-level client configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArkvConfig {
    pub logging: LoggingConfig,
    pub wallet: WalletConfig,
    pub crypto: CryptoConfig,
    pub records: RecordsConfig,
}

impl ArkvConfig {
    /// Parse a TOML document. Absent sections and keys take their defaults.
    pub fn parse(toml_str: &str) -> ArkvResult<Self> {
        toml::from_str(toml_str).map_err(|e| ArkvError::Config(e.to_string()))
    }

    /// Render as pretty TOML, as `arkv config show` prints it.
    pub fn to_toml(&self) -> ArkvResult<String> {
        toml::to_string_pretty(self).map_err(|e| ArkvError::Config(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or EnvFilter directive (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Wallet key file: JWK JSON or PKCS#8 / PKCS#1 PEM
    pub key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Memoize archive keys for the lifetime of a session (default: true)
    pub cache_archive_keys: bool,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            cache_archive_keys: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordsConfig {
    /// Directory for encrypted output when `--output` is not given
    pub output_dir: Option<PathBuf>,
}

/// Default config location: `$HOME/.config/arkv/config.toml`
pub fn default_config_path() -> PathBuf {
    expand_tilde(Path::new("~/.config/arkv/config.toml"))
}

/// Expand `~` in path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}
