use thiserror::Error;

/// Errors surfaced by the visitor counting core.
#[derive(Debug, Error)]
pub enum Error {
    /// ROI polygon text was not valid JSON of the form `[[x, y], ...]`.
    #[error("failed to parse ROI polygon: {0}")]
    RoiParse(#[from] serde_json::Error),
    /// A direction string was neither `IN` nor `OUT`.
    #[error("unrecognized direction: {0}")]
    Direction(String),
    /// An event submission toward the ingestion boundary failed.
    #[error("event submission failed: {0}")]
    Submission(String),
}
