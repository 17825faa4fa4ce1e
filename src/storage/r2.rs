use std::time::Duration;

use async_trait::async_trait;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::Region;

use crate::error::{AppError, AppResult};

use super::{BlobRef, StorageBackend};

pub struct R2Backend {
    bucket: Box<Bucket>,
    bucket_name: String,
    url_ttl: Duration,
}

impl R2Backend {
    pub fn new(
        bucket_name: String,
        account_id: String,
        access_key: String,
        secret_key: String,
        url_ttl: Duration,
    ) -> AppResult<Self> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: format!("https://{}.r2.cloudflarestorage.com", account_id),
        };

        let credentials = Credentials::new(
            Some(&access_key),
            Some(&secret_key),
            None, // security token
            None, // session token
            None, // profile
        )
        .map_err(|e| AppError::Storage(format!("R2 credentials error: {}", e)))?;

        let bucket = Bucket::new(&bucket_name, region, credentials)
            .map_err(|e| AppError::Storage(format!("R2 bucket error: {}", e)))?;

        Ok(Self {
            bucket,
            bucket_name,
            url_ttl,
        })
    }
}

#[async_trait]
impl StorageBackend for R2Backend {
    async fn list(&self, prefix: &str) -> AppResult<Vec<BlobRef>> {
        let pages = self
            .bucket
            .list(prefix.to_string(), Some("/".to_string()))
            .await
            .map_err(|e| AppError::Storage(format!("R2 list failed: {}", e)))?;

        let refs: Vec<BlobRef> = pages
            .into_iter()
            .flat_map(|page| page.contents)
            .map(|object| BlobRef::new(object.key))
            .collect();

        tracing::info!(
            "R2 list: bucket={}, prefix={}, count={}",
            self.bucket_name,
            prefix,
            refs.len()
        );
        Ok(refs)
    }

    async fn resolve_url(&self, blob: &BlobRef) -> AppResult<String> {
        // presigned URLs are capped at 7 days
        let expiry = self.url_ttl.as_secs().clamp(1, 604_800) as u32;
        self.bucket
            .presign_get(&blob.key, expiry, None)
            .await
            .map_err(|e| AppError::Storage(format!("R2 presign failed: {}", e)))
    }

    fn bucket(&self) -> &str {
        &self.bucket_name
    }
}
