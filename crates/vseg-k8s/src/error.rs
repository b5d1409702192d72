//! Kubernetes error types.

use thiserror::Error;

pub type K8sResult<T> = Result<T, K8sError>;

#[derive(Debug, Error)]
pub enum K8sError {
    #[error("Kubernetes client initialization failed: {0}")]
    ClientInit(#[source] kube::Error),

    #[error("config map {name} could not be applied: {source}")]
    ConfigMap {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("job {name} could not be created: {source}")]
    Job {
        name: String,
        #[source]
        source: kube::Error,
    },
}

/// The apiserver reports a create of an existing resource as a 409 with
/// reason `AlreadyExists`; replayed segments hit this on every resource.
pub fn is_already_exists(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.reason == "AlreadyExists")
}
