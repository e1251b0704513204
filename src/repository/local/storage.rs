//! In-memory object storage for the local backend

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::Bucket;
use crate::repository::encode_object_key;
use crate::repository::error::{BackendError, BackendResult};
use crate::repository::traits::ObjectStorage;

pub const LOCAL_STORAGE_BASE: &str = "local://board";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<Mutex<HashMap<(Bucket, String), StoredObject>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bucket: Bucket, key: &str) -> Option<StoredObject> {
        self.objects.lock().get(&(bucket, key.to_string())).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every following upload fail, as an unreachable bucket would
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        bucket: Bucket,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BackendResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BackendError::Transport(format!(
                "bucket {} is unavailable",
                bucket.as_str()
            )));
        }
        let object = StoredObject {
            bytes,
            content_type: content_type.to_string(),
        };
        self.objects.lock().insert((bucket, key.to_string()), object);
        Ok(())
    }

    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        format!(
            "{}/{}/{}",
            LOCAL_STORAGE_BASE,
            bucket.as_str(),
            encode_object_key(key)
        )
    }
}
