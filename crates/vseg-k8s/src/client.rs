//! Kubernetes client and idempotent submission.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, PostParams};
use tracing::{debug, info};

use vseg_models::JobSpec;

use crate::error::{is_already_exists, K8sError, K8sResult};
use crate::jobs::{build_config_map, build_job, config_map_name, job_name};
use crate::submitter::JobSubmitter;

/// Cluster client. Uses in-cluster configuration when available, falling back
/// to the local kubeconfig.
pub struct KubeClient {
    client: kube::Client,
}

impl KubeClient {
    pub async fn new() -> K8sResult<Self> {
        let client = kube::Client::try_default()
            .await
            .map_err(K8sError::ClientInit)?;
        Ok(Self { client })
    }

    /// Whether the apiserver answers a version request.
    pub async fn is_healthy(&self) -> bool {
        self.client.apiserver_version().await.is_ok()
    }

    /// Create the timestamp config map, or update it in place when a replayed
    /// segment already created it.
    async fn apply_config_map(&self, spec: &JobSpec) -> K8sResult<()> {
        let name = config_map_name(spec);
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &spec.namespace);
        let config_map = build_config_map(spec);

        match api.create(&PostParams::default(), &config_map).await {
            Ok(_) => {}
            Err(err) if is_already_exists(&err) => {
                let existing = api.get(&name).await.map_err(|source| K8sError::ConfigMap {
                    name: name.clone(),
                    source,
                })?;
                let mut replacement = config_map;
                replacement.metadata.resource_version = existing.metadata.resource_version;
                api.replace(&name, &PostParams::default(), &replacement)
                    .await
                    .map_err(|source| K8sError::ConfigMap {
                        name: name.clone(),
                        source,
                    })?;
            }
            Err(source) => return Err(K8sError::ConfigMap { name, source }),
        }

        debug!(config_map = %name, "config map ready");
        Ok(())
    }

    async fn create_job(&self, spec: &JobSpec) -> K8sResult<()> {
        let name = job_name(spec);
        let api: Api<Job> = Api::namespaced(self.client.clone(), &spec.namespace);
        let job = build_job(spec);

        match api.create(&PostParams::default(), &job).await {
            Ok(_) => {
                info!(job = %name, "job submitted");
                Ok(())
            }
            Err(err) if is_already_exists(&err) => {
                // A replayed message must not double-submit.
                info!(job = %name, "job already exists, treating as submitted");
                Ok(())
            }
            Err(source) => Err(K8sError::Job { name, source }),
        }
    }
}

#[async_trait]
impl JobSubmitter for KubeClient {
    async fn submit_job(&self, spec: &JobSpec) -> K8sResult<()> {
        self.apply_config_map(spec).await?;
        self.create_job(spec).await?;
        Ok(())
    }
}
