//! CLI configuration (`datapipes.toml`).
//!
//! ```toml
//! [output]
//! format = "json"
//!
//! [log]
//! level = "debug"
//!
//! [chains]
//! preview = "head(3)"
//! tagged = "append_col(x=true, name='seen') >> head(10)"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PipeError, PipeResult};

pub const CONFIG_FILE: &str = "datapipes.toml";

/// How results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub log: LogConfig,
    /// Named chain expressions, runnable with `datapipes run <name>`.
    pub chains: BTreeMap<String, String>,
}

impl Config {
    pub fn from_toml(content: &str) -> PipeResult<Self> {
        toml::from_str(content).map_err(|e| PipeError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> PipeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| PipeError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load `./datapipes.toml`, else the user config file, else defaults.
    pub fn load() -> PipeResult<Self> {
        match Self::locate() {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// The first existing config file, if any.
    pub fn locate() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("datapipes").join("config.toml"))
            .filter(|path| path.exists())
    }

    pub fn chain(&self, name: &str) -> PipeResult<&str> {
        self.chains
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| PipeError::Config(format!("no chain named '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.output.format, OutputFormat::Table);
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            [output]
            format = "json"

            [log]
            level = "datapipes=debug"

            [chains]
            preview = "head(3)"
            "#,
        )
        .unwrap();

        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.log.level, "datapipes=debug");
        assert_eq!(config.chain("preview").unwrap(), "head(3)");
        assert_eq!(
            config.chain("missing").unwrap_err().to_string(),
            "Configuration error: no chain named 'missing'"
        );
    }

    #[test]
    fn test_malformed_config() {
        let err = Config::from_toml("[output]\nformat = \"xml\"").unwrap_err();
        assert!(matches!(err, PipeError::Config(_)));
    }
}
