use super::{print_json, runtime, GlobalOpts};
use catalog::Getter;
use clap::Args;
use common::error::FFError;

#[derive(Debug, Args)]
pub struct TestConnectionArgs {
    /// Id of the data source to probe
    #[arg(value_name = "SOURCE_ID")]
    pub source_id: String,

    /// Also pull a small sample of records
    #[arg(long)]
    pub extract: bool,
}

pub fn handle_test_connection(args: TestConnectionArgs, opts: &GlobalOpts) -> Result<(), FFError> {
    let (_, state) = opts.state()?;
    let source = state
        .catalog
        .get_data_source(&args.source_id)
        .map_err(FFError::run)?;

    let rt = runtime()?;
    let result = if args.extract {
        rt.block_on(state.tester.test_extraction(&source))
    } else {
        rt.block_on(state.tester.test_connection(&source))
    };
    print_json(&result)?;

    if result.success {
        Ok(())
    } else {
        Err(FFError::run_msg(result.message))
    }
}
