//! Error taxonomy for the prediction pipeline.
//!
//! None of these escape a prediction cycle: the generator and verdict
//! enforcer fold them into an absent result, and the ledger logs them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    /// The capability threw or returned unusable text on every attempt.
    #[error("text generation failed after {attempts} attempt(s): {reason}")]
    GenerationFailed { attempts: usize, reason: String },

    /// A single attempt's output did not satisfy its constraints.
    #[error("generated text rejected: {0}")]
    ValidationFailed(String),

    /// Structured output could not be parsed into the expected payload.
    #[error("malformed structured payload: {0}")]
    MalformedPayload(String),

    /// Insert, update or query against the prediction store failed.
    #[error("storage operation failed: {0}")]
    StorageFailed(String),

    /// Spread artwork could not be loaded, composited or written.
    #[error("spread image rendering failed: {0}")]
    RenderFailed(String),

    /// The sampler hit its resample cap before collecting a full hand.
    #[error("card sampling exhausted after {draws} draws")]
    SamplingExhausted { draws: usize },
}

impl From<rusqlite::Error> for OracleError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StorageFailed(err.to_string())
    }
}

impl From<image::ImageError> for OracleError {
    fn from(err: image::ImageError) -> Self {
        Self::RenderFailed(err.to_string())
    }
}

pub type OracleResult<T> = Result<T, OracleError>;
