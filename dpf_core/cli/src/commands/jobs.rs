use super::{print_json, runtime, GlobalOpts};
use clap::Args;
use common::error::FFError;

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Id of the job to execute
    #[arg(value_name = "JOB_ID")]
    pub job_id: String,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Jobs to execute, in order
    #[arg(value_name = "JOB_ID", required = true)]
    pub job_ids: Vec<String>,

    /// Jobs run side by side; overrides `executor.max_concurrent_jobs`
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// Execute one job and print its result. Fails when the run did not succeed.
pub fn handle_run(args: RunArgs, opts: &GlobalOpts) -> Result<(), FFError> {
    let (_, state) = opts.state()?;
    let result = runtime()?
        .block_on(state.executor.execute_job(&args.job_id))
        .map_err(FFError::run)?;
    print_json(&result)?;

    if result.success {
        Ok(())
    } else {
        Err(FFError::run_msg(format!(
            "job '{}' finished with status {}",
            args.job_id, result.status
        )))
    }
}

pub fn handle_batch(args: BatchArgs, opts: &GlobalOpts) -> Result<(), FFError> {
    let (_, state) = opts.state()?;
    let coordinator = match args.concurrency {
        Some(n) => state.batch.clone().with_concurrency(n),
        None => state.batch.clone(),
    };
    let summary = runtime()?.block_on(coordinator.execute_batch_jobs(args.job_ids.as_slice()));
    print_json(&summary)?;

    if summary.failure_count == 0 {
        Ok(())
    } else {
        Err(FFError::run_msg(format!(
            "{} of {} jobs failed",
            summary.failure_count, summary.total_jobs
        )))
    }
}
