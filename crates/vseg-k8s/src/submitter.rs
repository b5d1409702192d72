//! Submission seam for the dispatch path.

use async_trait::async_trait;

use vseg_models::JobSpec;

use crate::error::K8sResult;

/// Creates the orchestrator resources for one (segment, resolution) job.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    /// Idempotent: submitting the same spec twice yields at most one job and
    /// both calls succeed.
    async fn submit_job(&self, spec: &JobSpec) -> K8sResult<()>;
}
