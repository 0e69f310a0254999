//! Configuration loading and resolution
//!
//! Settings are resolved once at startup in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Steps 1 and 2 arrive together as [`ConfigOverrides`] (clap reads both);
//! the result is an immutable [`ServiceConfig`] handed to every component.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default Demucs model (six stems: vocals, drums, bass, other, piano, guitar)
pub const DEFAULT_MODEL: &str = "htdemucs_6s";

/// Default maximum upload size (100 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Hard wall-clock bound on one separation run
pub const DEFAULT_SEPARATION_TIMEOUT: Duration = Duration::from_secs(600);

/// Bound on the `--help` availability probe used by `/health`
pub const ENGINE_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on the `--help` probe used by `/test-demucs`
pub const DIAGNOSTIC_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional; absent fields fall through to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub upload_folder: Option<PathBuf>,

    #[serde(default)]
    pub separated_folder: Option<PathBuf>,

    /// Maximum accepted request body, in bytes
    #[serde(default)]
    pub max_content_length: Option<u64>,

    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

/// `[engine]` table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineSection {
    /// Argv prefix used to launch the engine, e.g. `["python", "-m", "demucs"]`
    #[serde(default)]
    pub command: Option<Vec<String>>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub separation_timeout_secs: Option<u64>,
}

/// `[logging]` table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSection {
    /// Log level or `EnvFilter` directives (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,

    /// Log file path (optional, logs to stderr only if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub upload_folder: Option<PathBuf>,
    pub separated_folder: Option<PathBuf>,
    pub max_content_length: Option<u64>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub engine_command: Option<Vec<String>>,
    pub model: Option<String>,
    pub separation_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
}

/// External separation engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Program followed by any leading arguments
    pub command: Vec<String>,
    pub model: String,
    pub separation_timeout: Duration,
    pub probe_timeout: Duration,
    pub diagnostic_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: vec!["demucs".to_string()],
            model: DEFAULT_MODEL.to_string(),
            separation_timeout: DEFAULT_SEPARATION_TIMEOUT,
            probe_timeout: ENGINE_PROBE_TIMEOUT,
            diagnostic_timeout: DIAGNOSTIC_PROBE_TIMEOUT,
        }
    }
}

/// Resolved logging settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Immutable service configuration, built once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Transient storage for uploaded inputs
    pub upload_dir: PathBuf,
    /// Durable storage for produced stems (served under `/separated`)
    pub output_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub host: String,
    pub port: u16,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Configuration with compiled defaults rooted at the given directories
    pub fn with_dirs(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Merge overrides over an optional TOML file over compiled defaults
    pub fn resolve(overrides: ConfigOverrides, file: Option<TomlConfig>) -> Result<Self> {
        let file = file.unwrap_or_default();
        let defaults = Self::with_dirs("uploads", "separated");

        let separation_timeout = overrides
            .separation_timeout_secs
            .or(file.engine.separation_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(defaults.engine.separation_timeout);

        let config = Self {
            upload_dir: overrides
                .upload_folder
                .or(file.upload_folder)
                .unwrap_or(defaults.upload_dir),
            output_dir: overrides
                .separated_folder
                .or(file.separated_folder)
                .unwrap_or(defaults.output_dir),
            max_upload_bytes: overrides
                .max_content_length
                .or(file.max_content_length)
                .unwrap_or(defaults.max_upload_bytes),
            host: overrides.host.or(file.host).unwrap_or(defaults.host),
            port: overrides.port.or(file.port).unwrap_or(defaults.port),
            engine: EngineConfig {
                command: overrides
                    .engine_command
                    .or(file.engine.command)
                    .unwrap_or(defaults.engine.command),
                model: overrides
                    .model
                    .or(file.engine.model)
                    .unwrap_or(defaults.engine.model),
                separation_timeout,
                ..defaults.engine
            },
            logging: LoggingConfig {
                level: overrides
                    .log_level
                    .or(file.logging.level)
                    .unwrap_or(defaults.logging.level),
                file: overrides.log_file.or(file.logging.file),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<()> {
        if self.max_upload_bytes == 0 {
            return Err(Error::Config("max_content_length must be greater than zero".to_string()));
        }
        if self.engine.separation_timeout.is_zero() {
            return Err(Error::Config("separation timeout must be greater than zero".to_string()));
        }
        match self.engine.command.first() {
            Some(program) if !program.trim().is_empty() => {}
            _ => return Err(Error::Config("engine command must name a program".to_string())),
        }
        if self.engine.model.trim().is_empty() {
            return Err(Error::Config("engine model must not be empty".to_string()));
        }
        if self.upload_dir.as_os_str().is_empty() || self.output_dir.as_os_str().is_empty() {
            return Err(Error::Config("storage folders must not be empty paths".to_string()));
        }
        Ok(())
    }

    /// Create upload and output directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.upload_dir, &self.output_dir] {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
                info!("Created directory: {}", dir.display());
            }
        }
        Ok(())
    }

    /// Upload limit in MiB as reported to clients, rounded up so a
    /// sub-MiB limit never reads as zero
    pub fn max_file_size_mb(&self) -> u64 {
        self.max_upload_bytes.div_ceil(1024 * 1024)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load the TOML config file
///
/// An explicit path must exist. Without one, the platform default locations
/// are tried; if none exists this returns `Ok(None)` and defaults apply.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<Option<TomlConfig>> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!("Config file not found: {}", path.display())));
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) => path,
            None => {
                warn!("No config file found, using defaults");
                return Ok(None);
            }
        },
    };

    let content = std::fs::read_to_string(&path)?;
    let config = toml::from_str::<TomlConfig>(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(Some(config))
}

/// First existing config file among the platform locations
fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("stemsplit").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/stemsplit/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_service() {
        let config = ServiceConfig::resolve(ConfigOverrides::default(), None).unwrap();
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.output_dir, PathBuf::from("separated"));
        assert_eq!(config.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(config.max_file_size_mb(), 100);
        assert_eq!(config.engine.command, vec!["demucs".to_string()]);
        assert_eq!(config.engine.model, "htdemucs_6s");
        assert_eq!(config.engine.separation_timeout, Duration::from_secs(600));
        assert_eq!(config.engine.probe_timeout, Duration::from_secs(5));
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn reported_limit_rounds_up_to_whole_mib() {
        let mut config = ServiceConfig::with_dirs("uploads", "separated");

        config.max_upload_bytes = 1024;
        assert_eq!(config.max_file_size_mb(), 1);

        config.max_upload_bytes = 1024 * 1024 + 1;
        assert_eq!(config.max_file_size_mb(), 2);

        config.max_upload_bytes = 5 * 1024 * 1024;
        assert_eq!(config.max_file_size_mb(), 5);
    }

    #[test]
    fn zero_upload_limit_is_rejected() {
        let overrides = ConfigOverrides {
            max_content_length: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            ServiceConfig::resolve(overrides, None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn empty_engine_command_is_rejected() {
        let overrides = ConfigOverrides {
            engine_command: Some(Vec::new()),
            ..Default::default()
        };
        assert!(ServiceConfig::resolve(overrides, None).is_err());
    }
}
