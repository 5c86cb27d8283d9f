use std::io;
use std::path::PathBuf;

/// Errors produced by the sample-store and reduction-pipeline layers.
///
/// Deep functions in this crate return `Result<_, PipelineError>` and never
/// panic outside of `debug_assert!`-gated invariant checks. The pipeline
/// driver is the only place that turns one of these into a process exit
/// code (0 success, 1 fatal, 100 skipped).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("destination store already exists: {0:?}")]
    DestinationExists(PathBuf),

    #[error("malformed parameters file {path:?}: {reason}")]
    BadParameters { path: PathBuf, reason: String },

    #[error("malformed samples-info file {path:?}: {reason}")]
    BadSampleInfo { path: PathBuf, reason: String },

    #[error("unsupported sorting/selection combination: {0}")]
    UnsupportedConfiguration(String),

    #[error("allocation failed: {0}")]
    Allocation(String),

    #[error("could not find {needed} linearly independent rows (found {found})")]
    SingularSeedMatrix { needed: usize, found: usize },

    #[error("record size mismatch: expected {expected}, found {found}")]
    RecordSizeMismatch { expected: usize, found: usize },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Wraps an I/O error with the path that was being accessed, for a more
/// useful message than `io::Error` alone provides.
pub(crate) fn io_err(path: &std::path::Path, source: io::Error) -> PipelineError {
    PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Status returned by a pipeline step, distinguishing "did the work" from
/// "nothing to do because the destination already exists".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Completed,
    Skipped,
}

impl StepStatus {
    /// Exit-code mapping used by the `lpn-app` binaries (spec section 6).
    pub fn exit_code(self) -> i32 {
        match self {
            StepStatus::Completed => 0,
            StepStatus::Skipped => 100,
        }
    }
}
