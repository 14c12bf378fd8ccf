mod jobs;
mod serve;
mod sources;
mod status;

pub use jobs::{handle_batch, handle_run, BatchArgs, RunArgs};
pub use serve::{handle_serve, ServeArgs};
pub use sources::{handle_test_connection, TestConnectionArgs};
pub use status::handle_status;

use common::config::{read_config, OrchestratorConfig};
use common::error::FFError;
use foundry_web::AppState;
use serde::Serialize;
use std::path::PathBuf;
use tokio::runtime::Runtime;

/// Global flags shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOpts {
    pub config_path: Option<PathBuf>,
    pub specs_dir: Option<PathBuf>,
}

impl GlobalOpts {
    /// Config file merged with the command-line overrides.
    pub fn config(&self) -> Result<OrchestratorConfig, FFError> {
        let mut config = read_config(self.config_path.clone())?;
        if let Some(dir) = &self.specs_dir {
            config.specs_dir = Some(dir.clone());
        }
        Ok(config)
    }

    pub fn state(&self) -> Result<(OrchestratorConfig, AppState), FFError> {
        let config = self.config()?;
        let state = AppState::from_config(&config)?;
        Ok((config, state))
    }
}

fn runtime() -> Result<Runtime, FFError> {
    Runtime::new().map_err(FFError::init)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), FFError> {
    let rendered = serde_json::to_string_pretty(value).map_err(FFError::run)?;
    println!("{rendered}");
    Ok(())
}
