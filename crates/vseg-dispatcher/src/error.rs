//! Dispatch error types.

use thiserror::Error;

use vseg_k8s::K8sError;
use vseg_models::ValidationError;
use vseg_state::StateError;

pub type DispatchResult<T> = Result<T, DispatchError>;

/// Per-resolution dispatch failures. Any of these nacks the message back to
/// the broker for redelivery.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("CRF configuration missing for resolution {0}")]
    MissingCrf(String),

    #[error("invalid job spec: {0}")]
    InvalidJobSpec(ValidationError),

    #[error("progress seeding failed for video {video_id} resolution {resolution}: {source}")]
    Seed {
        video_id: String,
        resolution: String,
        #[source]
        source: StateError,
    },

    #[error("transcode job creation failed for resolution {resolution}: {source}")]
    Submission {
        resolution: String,
        #[source]
        source: K8sError,
    },
}
