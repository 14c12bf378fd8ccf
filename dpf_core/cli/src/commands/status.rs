use super::{print_json, GlobalOpts};
use common::error::FFError;

pub fn handle_status(opts: &GlobalOpts) -> Result<(), FFError> {
    let (_, state) = opts.state()?;
    print_json(&state.status.snapshot())
}
