//! Object storage client

use std::sync::Arc;

use async_trait::async_trait;

use super::{check_status, Endpoint};
use crate::domain::Bucket;
use crate::repository::encode_object_key;
use crate::repository::error::BackendResult;
use crate::repository::traits::ObjectStorage;
use crate::session::SessionProvider;

#[derive(Clone)]
pub struct StorageClient {
    endpoint: Endpoint,
    session: Arc<dyn SessionProvider>,
}

impl StorageClient {
    pub fn new(endpoint: Endpoint, session: Arc<dyn SessionProvider>) -> Self {
        Self { endpoint, session }
    }

    fn object_path(bucket: Bucket, key: &str) -> String {
        format!("{}/{}", bucket.as_str(), encode_object_key(key))
    }
}

#[async_trait]
impl ObjectStorage for StorageClient {
    async fn upload(
        &self,
        bucket: Bucket,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<()> {
        let token = self.session.current().and_then(|s| s.access_token);
        let url = self
            .endpoint
            .url(&format!("/storage/v1/object/{}", Self::object_path(bucket, key)));
        let request = self
            .endpoint
            .http()
            .post(url)
            .header("Content-Type", content_type)
            .header("Cache-Control", "max-age=3600")
            .header("x-upsert", "false")
            .body(bytes);
        let response = self.endpoint.authorize(request, token.as_deref()).send().await?;
        check_status(response).await?;
        tracing::debug!("uploaded {} to {}", key, bucket.as_str());
        Ok(())
    }

    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        self.endpoint.url(&format!(
            "/storage/v1/object/public/{}",
            Self::object_path(bucket, key)
        ))
    }
}
