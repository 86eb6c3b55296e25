//! Error types for indextools.

use thiserror::Error;

/// Result type alias for indextools operations
pub type Result<T> = std::result::Result<T, IndexToolsError>;

/// Error types that can occur in indextools
#[derive(Debug, Error)]
pub enum IndexToolsError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or incompatible command-line options
    #[error("usage error: {0}")]
    Usage(String),

    /// Structural violation in a BAI file
    #[error("malformed index at byte offset {offset}: {msg}")]
    MalformedIndex {
        /// Byte offset in the index file where the violation was detected
        offset: u64,
        /// What was violated
        msg: String,
    },

    /// Invalid content in a non-index input file (contig sizes, BAM header, BED)
    #[error("invalid {format} format: {msg}")]
    InvalidFormat {
        /// Which format was being parsed
        format: &'static str,
        /// Error message
        msg: String,
    },

    /// Contig count or name mismatch between the index and the contig provider
    #[error("inconsistent inputs: {0}")]
    InconsistentInputs(String),

    /// The requested partition count cannot be satisfied
    #[error("cannot produce {requested} partitions; achievable: {achievable}")]
    InfeasiblePartitioning {
        /// Partitions requested on the command line
        requested: usize,
        /// Partitions the input can support
        achievable: usize,
    },

    /// Cooperative cancellation was observed between pipeline stages
    #[error("run cancelled")]
    Cancelled,
}

impl IndexToolsError {
    /// Process exit code for this error kind.
    ///
    /// `0` is success; `1` usage error; `2` malformed input; `3` infeasible
    /// partitioning; `4` I/O failure (and cancellation, which aborts the run
    /// before output exists).
    pub fn exit_code(&self) -> i32 {
        match self {
            IndexToolsError::Usage(_) => 1,
            IndexToolsError::MalformedIndex { .. }
            | IndexToolsError::InvalidFormat { .. }
            | IndexToolsError::InconsistentInputs(_) => 2,
            IndexToolsError::InfeasiblePartitioning { .. } => 3,
            IndexToolsError::Io(_) | IndexToolsError::Cancelled => 4,
        }
    }
}
