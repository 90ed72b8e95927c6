use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub report: ReportConfig,
    pub input: InputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Resolution token; validated when the report is built
    pub resolution: String,
    /// Report destination; stdout when unset
    pub output: Option<PathBuf>,
    /// Emit progress notes
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Extension of log files picked up from directories, without the dot
    #[serde(default = "InputConfig::default_extension")]
    pub extension: String,
    /// Descend into subdirectories
    #[serde(default = "InputConfig::default_recursive")]
    pub recursive: bool,
}

impl InputConfig {
    fn default_extension() -> String {
        "log".to_string()
    }

    const fn default_recursive() -> bool {
        true
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            extension: Self::default_extension(),
            recursive: Self::default_recursive(),
        }
    }
}

impl ReportConfig {
    const DEFAULT_RESOLUTION: &'static str = "hour";
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from a variable lookup
    pub fn from_vars<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolution = lookup("W3CSTAT_RESOLUTION")
            .unwrap_or_else(|| ReportConfig::DEFAULT_RESOLUTION.to_string());

        let output = lookup("W3CSTAT_OUTPUT")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let verbose = lookup("W3CSTAT_VERBOSE")
            .map(|v| parse_flag(&v))
            .transpose()
            .context("W3CSTAT_VERBOSE must be a boolean")?
            .unwrap_or(false);

        let extension = lookup("W3CSTAT_LOG_EXTENSION")
            .map(|v| v.trim_start_matches('.').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(InputConfig::default_extension);

        let recursive = lookup("W3CSTAT_RECURSIVE")
            .map(|v| parse_flag(&v))
            .transpose()
            .context("W3CSTAT_RECURSIVE must be a boolean")?
            .unwrap_or_else(InputConfig::default_recursive);

        Ok(Config {
            report: ReportConfig {
                resolution,
                output,
                verbose,
            },
            input: InputConfig {
                extension,
                recursive,
            },
        })
    }
}

fn parse_flag(value: &str) -> anyhow::Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => anyhow::bail!("unrecognized boolean '{other}'"),
    }
}
