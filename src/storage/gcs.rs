use std::time::Duration;

use async_trait::async_trait;
use google_cloud_storage::{
    client::{Client, ClientConfig},
    http::objects::list::ListObjectsRequest,
    sign::SignedURLOptions,
};

use crate::error::{AppError, AppResult};

use super::{BlobRef, StorageBackend};

pub struct GcsBackend {
    client: Client,
    bucket: String,
    url_ttl: Duration,
}

impl GcsBackend {
    pub async fn new(bucket: String, url_ttl: Duration) -> AppResult<Self> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .map_err(|e| AppError::Storage(format!("GCS auth failed: {}", e)))?;
        let client = Client::new(config);
        Ok(Self {
            client,
            bucket,
            url_ttl,
        })
    }
}

#[async_trait]
impl StorageBackend for GcsBackend {
    async fn list(&self, prefix: &str) -> AppResult<Vec<BlobRef>> {
        let mut refs = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects(&ListObjectsRequest {
                    bucket: self.bucket.clone(),
                    prefix: Some(prefix.to_string()),
                    delimiter: Some("/".to_string()),
                    page_token: page_token.take(),
                    ..Default::default()
                })
                .await
                .map_err(|e| AppError::Storage(format!("GCS list failed: {}", e)))?;

            refs.extend(
                response
                    .items
                    .unwrap_or_default()
                    .into_iter()
                    .map(|object| BlobRef::new(object.name)),
            );

            match response.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::info!(
            "GCS list: bucket={}, prefix={}, count={}",
            self.bucket,
            prefix,
            refs.len()
        );
        Ok(refs)
    }

    async fn resolve_url(&self, blob: &BlobRef) -> AppResult<String> {
        let options = SignedURLOptions {
            expires: self.url_ttl,
            ..Default::default()
        };
        self.client
            .signed_url(&self.bucket, &blob.key, None, None, options)
            .await
            .map_err(|e| AppError::Storage(format!("GCS signed url failed: {}", e)))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
