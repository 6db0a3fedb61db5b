//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MHTML_CONFIG` (environment variable)
//! 2. `~/.config/mhtml/config.toml` (Linux/macOS)
//!    `%APPDATA%\mhtml\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::export::extract::ExtractOptions;
use crate::export::filename::FilenameOptions;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Resource extraction defaults.
    pub extract: ExtractConfig,
    /// Output of the `headers` and `info` commands.
    pub display: DisplayConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Resource extraction defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Name used for resources without a usable location.
    pub default_filename: String,
    /// Inserted before the counter when a name is already taken.
    pub dup_prefix: String,
    /// Add an extension from the content type to names without one.
    pub guess_extension: bool,
    /// Decode base64 / quoted-printable bodies before writing.
    pub decode: bool,
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Bytes shown by `headers --print-preview`.
    pub preview_length: usize,
    /// Default content-type glob for `headers`.
    pub filter: String,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            default_filename: "index.html".to_string(),
            dup_prefix: "dup_".to_string(),
            guess_extension: true,
            decode: false,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            preview_length: 100,
            filter: "*".to_string(),
        }
    }
}

impl ExtractConfig {
    /// Extraction options; `decode` is forced on when requested on the command line.
    pub fn to_options(&self, decode: bool) -> ExtractOptions {
        ExtractOptions {
            decode: decode || self.decode,
            filename: FilenameOptions {
                default: self.default_filename.clone(),
                guess_extension: self.guess_extension,
                ext_from_default: false,
            },
            dup_prefix: self.dup_prefix.clone(),
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MHTML_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mhtml").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mhtml")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mhtml.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.extract.default_filename, "index.html");
        assert_eq!(cfg.extract.dup_prefix, "dup_");
        assert!(cfg.extract.guess_extension);
        assert!(!cfg.extract.decode);
        assert_eq!(cfg.display.preview_length, 100);
        assert_eq!(cfg.display.filter, "*");
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.extract.dup_prefix = "copy".to_string();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.extract.dup_prefix, "copy");
        assert_eq!(parsed.display.preview_length, cfg.display.preview_length);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[extract]
decode = true

[display]
filter = "image/*"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert!(cfg.extract.decode);
        assert_eq!(cfg.display.filter, "image/*");
        // Other fields use defaults
        assert_eq!(cfg.extract.default_filename, "index.html");
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_extract_options() {
        let cfg = ExtractConfig {
            default_filename: "res.bin".to_string(),
            ..ExtractConfig::default()
        };
        let opts = cfg.to_options(false);
        assert!(!opts.decode);
        assert_eq!(opts.filename.default, "res.bin");
        assert!(cfg.to_options(true).decode);
    }

    #[test]
    fn test_log_file_in_cache_dir() {
        let mut cfg = Config::default();
        cfg.general.cache_dir = Some(PathBuf::from("/tmp/mhtml-cache"));
        assert_eq!(log_file_path(&cfg), PathBuf::from("/tmp/mhtml-cache/mhtml.log"));
    }
}
