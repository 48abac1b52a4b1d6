//! Build command implementation.

use std::io::Write;
use std::path::Path;

use mdpress_core::build::BuildOptions;
use mdpress_core::index::NoteId;

use super::output::{RunOutput, print_run_summary};
use super::{EXIT_FATAL, open_session};
use crate::BuildArgs;

pub fn run(config: Option<&Path>, args: &BuildArgs) -> color_eyre::Result<i32> {
    if args.jobs == Some(0) {
        eprintln!("--jobs must be at least 1");
        return Ok(EXIT_FATAL);
    }

    let session = match open_session(config) {
        Ok(session) => session,
        Err(code) => return Ok(code),
    };

    if !args.json {
        println!("Building vault: {}", session.config().vault_root.display());
    }

    let options = BuildOptions { jobs: args.jobs, typeset: !args.no_typeset };
    let quiet = args.json;
    let progress = |current: usize, total: usize, _note: &NoteId| {
        if !quiet && (current % 10 == 0 || current == total) {
            eprint!("\rCompiling... {current}/{total}");
            std::io::stderr().flush().ok();
            if current == total {
                eprintln!();
            }
        }
    };

    let report = match session.build(&options, progress) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            return Ok(EXIT_FATAL);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&RunOutput::from(&report))?);
    } else {
        print_run_summary(&report);
    }

    Ok(report.exit_code())
}
