//! Runtime Configuration
//!
//! # Configuration Sources (later sources win)
//!
//! 1. Config file: `--config <path>`, else `tickload.toml` in the working directory
//! 2. Environment variables: `TICKLOAD_ASSET_DIR`, `TICKLOAD_TICK_MS`, `TICKLOAD_TIMEOUT_MS`
//! 3. Positional arguments, appended to the preload list
//!
//! # Example Config File
//!
//! ```toml
//! asset_dir = "assets"
//! preload = ["textures/grass.png", "notes/readme.txt"]
//! timeout_ms = 5000
//!
//! [manager]
//! tick_interval_ms = 16
//! skip_cached_on_dispatch = true
//!
//! [[atlas]]
//! name = "ui"
//! parts = ["ui/ok.png", "ui/cancel.png"]
//! padding = 1
//! max_width = 1024
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tickload::AssetManagerConfig;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "tickload.toml";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing value for {0}")]
    MissingValue(String),
}

/// One atlas to build at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasConfig {
    /// Compound path the atlas is cached under
    pub name: String,
    /// Texture parts, relative to the asset directory
    pub parts: Vec<String>,
    #[serde(default = "default_padding")]
    pub padding: u32,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
}

fn default_padding() -> u32 {
    1
}

fn default_max_width() -> u32 {
    2048
}

/// Complete runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Root directory asset paths are resolved against
    pub asset_dir: PathBuf,
    /// Asset manager settings
    pub manager: AssetManagerConfig,
    /// Assets loaded at startup
    pub preload: Vec<String>,
    /// Atlases built at startup
    #[serde(rename = "atlas")]
    pub atlases: Vec<AtlasConfig>,
    /// How long to wait for every startup asset
    pub timeout_ms: u64,
    /// Config file path (for reporting)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            asset_dir: PathBuf::from("assets"),
            manager: AssetManagerConfig::default(),
            preload: Vec::new(),
            atlases: Vec::new(),
            timeout_ms: 5000,
            config_path: None,
        }
    }
}

/// Parsed command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    /// `--config <path>`
    pub config: Option<PathBuf>,
    /// `--json`: print the final report as JSON
    pub json: bool,
    /// Positional asset paths
    pub paths: Vec<String>,
}

impl CliArgs {
    /// Parse arguments, program name excluded
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, ConfigError> {
        let mut cli = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args
                        .next()
                        .ok_or_else(|| ConfigError::MissingValue(arg.clone()))?;
                    cli.config = Some(PathBuf::from(path));
                }
                "--json" => cli.json = true,
                flag if flag.starts_with("--") => {
                    log::warn!("Ignoring unknown flag {}", flag);
                }
                path => cli.paths.push(path.to_string()),
            }
        }

        Ok(cli)
    }
}

impl RuntimeConfig {
    /// Load configuration from every source
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        Self::load_with(cli, |key| std::env::var(key).ok())
    }

    /// Load configuration with a custom environment lookup
    pub fn load_with<E>(cli: &CliArgs, env: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        // 1. Config file
        let mut config = match &cli.config {
            Some(path) => Self::load_from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load_from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        // 2. Environment
        config.apply_env(env)?;

        // 3. Positional arguments
        config.preload.extend(cli.paths.iter().cloned());

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.config_path = Some(path.to_path_buf());
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn apply_env<E>(&mut self, env: E) -> Result<(), ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = env("TICKLOAD_ASSET_DIR").filter(|d| !d.is_empty()) {
            self.asset_dir = PathBuf::from(dir);
            log::info!("Asset dir from env: {}", self.asset_dir.display());
        }
        if let Some(ms) = env("TICKLOAD_TICK_MS") {
            self.manager.tick_interval_ms = parse_millis("TICKLOAD_TICK_MS", &ms)?;
        }
        if let Some(ms) = env("TICKLOAD_TIMEOUT_MS") {
            self.timeout_ms = parse_millis("TICKLOAD_TIMEOUT_MS", &ms)?;
        }
        Ok(())
    }

    /// Startup wait limit
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Log a summary of the configuration
    pub fn print_summary(&self) {
        log::info!("=== Runtime Configuration ===");
        if let Some(path) = &self.config_path {
            log::info!("  Config file: {}", path.display());
        }
        log::info!("  Asset dir: {}", self.asset_dir.display());
        log::info!("  Tick interval: {} ms", self.manager.tick_interval_ms);
        log::info!("  Preload: {} asset(s)", self.preload.len());
        log::info!("  Atlases: {}", self.atlases.len());
        log::info!("  Timeout: {} ms", self.timeout_ms);
        log::info!("=============================");
    }
}

fn parse_millis(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_toml() {
        let config: RuntimeConfig = toml::from_str(
            r#"
            asset_dir = "data"
            preload = ["a.png"]

            [manager]
            tick_interval_ms = 4

            [[atlas]]
            name = "ui"
            parts = ["ok.png", "cancel.png"]
            max_width = 256
            "#,
        )
        .unwrap();

        assert_eq!(config.asset_dir, PathBuf::from("data"));
        assert_eq!(config.manager.tick_interval_ms, 4);
        assert!(config.manager.skip_cached_on_dispatch);
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.atlases[0].padding, 1);
        assert_eq!(config.atlases[0].max_width, 256);
    }

    #[test]
    fn test_cli_args() {
        let cli = CliArgs::parse(args(&["--json", "a.png", "--config", "x.toml", "b.txt"])).unwrap();

        assert!(cli.json);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert_eq!(cli.paths, vec!["a.png", "b.txt"]);
        assert!(matches!(
            CliArgs::parse(args(&["--config"])),
            Err(ConfigError::MissingValue(_))
        ));
    }

    #[test]
    fn test_layering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickload.toml");
        std::fs::write(&path, "asset_dir = \"from_file\"\npreload = [\"file.png\"]\ntimeout_ms = 10\n").unwrap();

        let cli = CliArgs {
            config: Some(path.clone()),
            json: false,
            paths: vec!["arg.png".into()],
        };
        let env: HashMap<&str, &str> = [("TICKLOAD_ASSET_DIR", "from_env"), ("TICKLOAD_TICK_MS", "8")]
            .into_iter()
            .collect();
        let config = RuntimeConfig::load_with(&cli, |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.asset_dir, PathBuf::from("from_env"));
        assert_eq!(config.manager.tick_interval_ms, 8);
        assert_eq!(config.timeout_ms, 10);
        assert_eq!(config.preload, vec!["file.png", "arg.png"]);
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_bad_values() {
        let cli = CliArgs {
            config: Some(PathBuf::from("/nonexistent/tickload.toml")),
            ..Default::default()
        };
        assert!(matches!(
            RuntimeConfig::load_with(&cli, |_| None),
            Err(ConfigError::Io { .. })
        ));

        let mut config = RuntimeConfig::default();
        let result = config.apply_env(|k| (k == "TICKLOAD_TIMEOUT_MS").then(|| "soon".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
