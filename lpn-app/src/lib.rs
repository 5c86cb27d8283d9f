//! Shared plumbing for the `lpn-app` driver binaries: hard-coded data
//! layout and the error-to-exit-code mapping described in spec section 6.
//!
//! Grounded on `whitebox-tools-app/src/main.rs`'s `fn main() { match run()
//! {...} }` shape, simplified: these drivers take no flags, so `run()` has
//! no argument parsing, only the fixed schedule for one challenge instance.

use std::path::{Path, PathBuf};

use lpn_core::error::PipelineError;

/// All stores for a run live under this directory, one subdirectory per
/// stage. File-naming conventions are an explicit external-collaborator
/// concern (spec section 1); this is just this driver's own choice.
pub const DATA_ROOT: &str = "lpn-data";

pub fn stage_dir(name: &str) -> PathBuf {
    Path::new(DATA_ROOT).join(name)
}

/// Prints a human-readable "step failed: <name>: <error>" message and
/// returns the spec section 6 exit code (0 success / 1 fatal / 100
/// skipped already-done).
pub fn report(step_name: &str, result: Result<lpn_core::error::StepStatus, PipelineError>) -> i32 {
    match result {
        Ok(status) => {
            if status == lpn_core::error::StepStatus::Skipped {
                println!("{step_name}: skipped, destination already exists");
            } else {
                println!("{step_name}: completed");
            }
            status.exit_code()
        }
        Err(err) => {
            eprintln!("step failed: {step_name}: {err}");
            1
        }
    }
}

/// Same mapping for the initial conversion step, which has no
/// `StepStatus::Skipped` path of its own: an existing destination is
/// always fatal (spec section 7, "1 for the initial conversion").
pub fn report_initial(step_name: &str, result: Result<(), PipelineError>) -> i32 {
    match result {
        Ok(()) => {
            println!("{step_name}: completed");
            0
        }
        Err(PipelineError::DestinationExists(dir)) => {
            eprintln!("step failed: {step_name}: destination already exists: {dir:?}");
            1
        }
        Err(err) => {
            eprintln!("step failed: {step_name}: {err}");
            1
        }
    }
}
