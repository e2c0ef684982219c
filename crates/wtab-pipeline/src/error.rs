//! Error types for pipeline operations

use crate::chunk::ChunkRange;
use thiserror::Error;
use wtab_render::RenderError;

/// Errors that stop a pipeline stage
///
/// Per-table problems never show up here: rejected and unrenderable tables go
/// to the chunk's error stream instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The renderer session could not be started or was lost.
    #[error("renderer failed: {0}")]
    Render(#[from] RenderError),

    /// A sample image could not be written.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A worker process could not be started.
    #[error("failed to spawn worker for chunk {range}: {source}")]
    WorkerSpawn {
        range: ChunkRange,
        #[source]
        source: std::io::Error,
    },

    /// A worker process exited unsuccessfully.
    #[error("worker for chunk {range} failed: {status}")]
    WorkerFailed { range: ChunkRange, status: String },

    /// A worker exited cleanly but printed no usable report.
    #[error("worker for chunk {range} returned no report: {detail}")]
    WorkerReport { range: ChunkRange, detail: String },

    #[error("invalid record range {start}..{end}")]
    InvalidRange { start: usize, end: usize },
}

/// Result alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
