use crate::config::error::ConfigError;
use crate::config::OrchestratorConfig;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "foundry-etl.yml";

/// Read the orchestrator config.
///
/// An explicit path must exist. Without one, `foundry-etl.yml` in the working
/// directory is used when present, otherwise every setting takes its default.
/// Relative `specs_dir` / `state_dir` entries resolve against the config
/// file's directory.
pub fn read_config(config_path: Option<PathBuf>) -> Result<OrchestratorConfig, ConfigError> {
    let path = match config_path {
        Some(path) if path.is_dir() => path.join(DEFAULT_CONFIG_FILE),
        Some(path) => path,
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                log::info!("no {DEFAULT_CONFIG_FILE} found, using default configuration");
                return Ok(OrchestratorConfig::default());
            }
            default
        }
    };

    if !path.exists() {
        return Err(ConfigError::incorrect_path(&path));
    }

    let raw = fs::read_to_string(&path)?;
    let mut config = parse_config(&path, &raw)?;

    let config_root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    config.specs_dir = config
        .specs_dir
        .map(|dir| resolve_path(&config_root, &dir));
    config.state_dir = config
        .state_dir
        .map(|dir| resolve_path(&config_root, &dir));

    log::info!("loaded configuration from {}", path.display());
    Ok(config)
}

fn parse_config(path: &Path, raw: &str) -> Result<OrchestratorConfig, ConfigError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yml") | Some("yaml") => {
            // an empty YAML document is valid and means "all defaults"
            if raw.trim().is_empty() {
                return Ok(OrchestratorConfig::default());
            }
            Ok(serde_yaml::from_str(raw)?)
        }
        Some("toml") => Ok(toml::from_str(raw)?),
        _ => Err(ConfigError::unsupported_format(path)),
    }
}

pub(crate) fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
