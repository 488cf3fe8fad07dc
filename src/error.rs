use thiserror::Error;

/// Errors produced by the matrix engine.
///
/// Truncated byte payloads and degenerate spike ranges are not errors; see
/// [`crate::state::matrix::LoadOutcome`] and [`crate::processing::spike_range::SpikeRange`].
#[derive(Debug, Error)]
pub enum MatrixError {
    /// Growing the sample buffer failed. The buffer is left as it was.
    #[error("matrix resize to {requested} samples failed: out of memory")]
    OutOfMemory { requested: usize },

    /// A cell was addressed outside the current dimensions or past the allocated samples.
    #[error("cell ({x}, {y}) is outside the {width}x{height} matrix")]
    InvalidIndex {
        x: i64,
        y: i64,
        width: usize,
        height: usize,
    },

    #[error("invalid matrix dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("malformed matrix snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("data source error: {0}")]
    Source(String),

    /// JSON configuration or descriptor could not be (de)serialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MatrixError>;
