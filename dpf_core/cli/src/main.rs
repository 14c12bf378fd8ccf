mod commands;

use crate::commands::{
    handle_batch, handle_run, handle_serve, handle_status, handle_test_connection, BatchArgs,
    GlobalOpts, RunArgs, ServeArgs, TestConnectionArgs,
};

use clap::{Parser, Subcommand};
use common::error::FFError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dpf-etl", about = "ETL job orchestration engine")]
pub struct Cli {
    #[arg(long = "config", short = 'c', help = "path to config file", global = true)]
    pub config_path: Option<PathBuf>,
    #[arg(
        long = "specs",
        short = 's',
        help = "directory of pipeline spec files",
        global = true
    )]
    pub specs_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Cmd,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Run the REST API
    Serve(ServeArgs),
    /// Execute a single job
    Run(RunArgs),
    /// Execute several jobs and report each outcome
    Batch(BatchArgs),
    /// Probe a data source through its adapter
    TestConnection(TestConnectionArgs),
    /// Print the system status snapshot
    Status,
}

fn run_cmd(func: Result<(), FFError>) {
    if let Err(e) = func {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn main() {
    logging::init_logger();
    let cli = Cli::parse();
    let opts = GlobalOpts {
        config_path: cli.config_path,
        specs_dir: cli.specs_dir,
    };

    match cli.command {
        Cmd::Serve(args) => run_cmd(handle_serve(args, &opts)),
        Cmd::Run(args) => run_cmd(handle_run(args, &opts)),
        Cmd::Batch(args) => run_cmd(handle_batch(args, &opts)),
        Cmd::TestConnection(args) => run_cmd(handle_test_connection(args, &opts)),
        Cmd::Status => run_cmd(handle_status(&opts)),
    }
}
