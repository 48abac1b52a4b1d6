use std::path::Path;

use super::open_session;
use super::output::{CheckOutput, print_check_summary};
use crate::CheckArgs;

/// Exit 1 when any reference is broken, 0 otherwise.
pub fn run(config: Option<&Path>, args: &CheckArgs) -> color_eyre::Result<i32> {
    let session = match open_session(config) {
        Ok(session) => session,
        Err(code) => return Ok(code),
    };

    let report = session.check();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&CheckOutput::from(&report))?);
    } else {
        print_check_summary(&report);
    }

    Ok(if report.warnings.is_empty() { 0 } else { 1 })
}
