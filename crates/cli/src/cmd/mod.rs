pub mod build;
pub mod check;
pub mod doctor;
pub mod output;

use std::path::Path;

use mdpress_core::build::BuildSession;
use mdpress_core::config::loader::ConfigLoader;

/// Exit code for configuration, index and book errors.
pub const EXIT_FATAL: i32 = 2;

/// Load the configuration, start logging and open a session. Failures are
/// printed and mapped to [`EXIT_FATAL`].
pub fn open_session(config: Option<&Path>) -> Result<BuildSession, i32> {
    let rc = match ConfigLoader::load(config) {
        Ok(rc) => rc,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            return Err(EXIT_FATAL);
        }
    };

    if let Err(e) = crate::logging::init(&rc.logging) {
        eprintln!("Failed to open log file: {e}");
        return Err(EXIT_FATAL);
    }
    tracing::debug!("loaded config from {}", rc.source.display());

    BuildSession::open(rc).map_err(|e| {
        eprintln!("Error: {e}");
        EXIT_FATAL
    })
}
