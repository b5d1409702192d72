//! Object-store client, used only to verify the output bucket is reachable.
//!
//! The transcoder jobs talk to the store themselves; the dispatcher just
//! pings it for readiness reporting.

use aws_credential_types::Credentials;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Region};
use thiserror::Error;
use tracing::info;

use crate::config::ObjectStoreSettings;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ObjectStoreError(String);

pub struct ObjectStore {
    client: aws_sdk_s3::Client,
    output_bucket: String,
}

impl ObjectStore {
    pub fn new(settings: &ObjectStoreSettings) -> Result<Self, ObjectStoreError> {
        if settings.endpoint.is_empty() {
            return Err(ObjectStoreError(
                "object store endpoint is not configured".to_string(),
            ));
        }

        let scheme = if settings.use_ssl { "https" } else { "http" };
        let credentials = Credentials::from_keys(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
        );
        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(format!("{scheme}://{}", settings.endpoint))
            .credentials_provider(credentials)
            // MinIO serves buckets path-style.
            .force_path_style(true)
            .build();

        info!(endpoint = %settings.endpoint, "object store client initialized");
        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(config),
            output_bucket: settings.output_bucket.clone(),
        })
    }

    /// HeadBucket against the output bucket.
    pub async fn bucket_ping(&self) -> Result<(), ObjectStoreError> {
        self.client
            .head_bucket()
            .bucket(&self.output_bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| {
                ObjectStoreError(format!(
                    "bucket '{}' is not reachable: {e}",
                    self.output_bucket
                ))
            })
    }
}
