use super::{runtime, GlobalOpts};
use clap::Args;
use common::error::FFError;
use foundry_web::{run_backend, BackendConfig};

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to bind the API server; overrides `server.addr`
    #[arg(long)]
    pub addr: Option<String>,
}

pub fn handle_serve(args: ServeArgs, opts: &GlobalOpts) -> Result<(), FFError> {
    let (config, state) = opts.state()?;
    let addr = args.addr.unwrap_or(config.server.addr);

    runtime()?
        .block_on(run_backend(BackendConfig { addr }, state))
        .map_err(FFError::run)
}
