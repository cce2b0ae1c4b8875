use super::VerifyLevelArg;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Settings read from the `[diagnose]` table, already validated.
#[derive(Debug, Clone, Default)]
pub struct DiagnoseDefaults {
    pub report: Option<PathBuf>,
    pub dump: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    pub export_prefix: Option<String>,
    pub row_limit: Option<usize>,
    pub busy_timeout_ms: Option<u64>,
    pub level: Option<VerifyLevelArg>,
    pub vacuum: Option<bool>,
}

#[derive(Debug, Default)]
pub struct CliConfig {
    path: Option<PathBuf>,
    data: RawConfig,
    diagnose: DiagnoseDefaults,
}

impl CliConfig {
    /// Loads the config file.
    ///
    /// An explicit path must exist. The default location is optional and a
    /// missing file there yields an empty config.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound { path }),
            Some(path) => path,
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                other => {
                    return Ok(Self {
                        path: other,
                        ..Self::default()
                    })
                }
            },
        };
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml(&contents, Some(path))
    }

    /// Parses config text; `origin` is the file it came from, if any.
    pub fn from_toml(contents: &str, origin: Option<PathBuf>) -> Result<Self, ConfigError> {
        let data: RawConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.clone().unwrap_or_else(|| PathBuf::from("<inline>")),
            source,
        })?;
        let diagnose = convert_diagnose(&data.diagnose)?;
        Ok(Self {
            path: origin,
            data,
            diagnose,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn default_db_path(&self) -> Option<&PathBuf> {
        self.data.database.default_path.as_ref()
    }

    pub fn diagnose(&self) -> &DiagnoseDefaults {
        &self.diagnose
    }
}

fn convert_diagnose(raw: &RawDiagnose) -> Result<DiagnoseDefaults, ConfigError> {
    let level = match raw.level.as_deref() {
        Some(value) => Some(
            VerifyLevelArg::from_str(value, true).map_err(|_| ConfigError::InvalidLevel {
                value: value.to_string(),
            })?,
        ),
        None => None,
    };
    Ok(DiagnoseDefaults {
        report: raw.report.clone(),
        dump: raw.dump.clone(),
        export_dir: raw.export_dir.clone(),
        export_prefix: raw.export_prefix.clone(),
        row_limit: raw.row_limit,
        busy_timeout_ms: raw.busy_timeout_ms,
        level,
        vacuum: raw.vacuum,
    })
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawConfig {
    #[serde(default)]
    database: DatabaseSection,
    #[serde(default)]
    diagnose: RawDiagnose,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct DatabaseSection {
    #[serde(rename = "default")]
    default_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawDiagnose {
    report: Option<PathBuf>,
    dump: Option<PathBuf>,
    export_dir: Option<PathBuf>,
    export_prefix: Option<String>,
    row_limit: Option<usize>,
    busy_timeout_ms: Option<u64>,
    level: Option<String>,
    vacuum: Option<bool>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {path} does not exist")]
    NotFound { path: PathBuf },
    #[error("failed to read CLI config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse CLI config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("diagnose level '{value}' is invalid (expected fast or full)")]
    InvalidLevel { value: String },
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("salvage").join("cli.toml"))
}
