//! In-memory object store for tests and local development.
//!
//! Holds only what the gateway ever asks about: key -> size.  Signed URLs
//! are synthesized against a configured endpoint so responses have the
//! same shape they would with a real backend.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::backend::{append_token, ObjectStore, SignedOperation};

/// Object store backed by an in-process map.
pub struct MemoryObjectStore {
    /// storage_key -> size in bytes.
    objects: tokio::sync::RwLock<HashMap<String, u64>>,
    /// Base URL minted signed URLs point at.
    endpoint: String,
    /// Fixed validity window for signed URLs.
    url_expiry: Duration,
}

impl MemoryObjectStore {
    /// Create an empty store minting URLs under `endpoint`.
    pub fn new(endpoint: &str, url_expiry: Duration) -> Self {
        Self {
            objects: tokio::sync::RwLock::new(HashMap::new()),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            url_expiry,
        }
    }

    /// Record an object as present at `storage_key` with `size` bytes.
    pub async fn insert(&self, storage_key: &str, size: u64) {
        self.objects
            .write()
            .await
            .insert(storage_key.to_string(), size);
    }
}

impl ObjectStore for MemoryObjectStore {
    fn exists(
        &self,
        storage_key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
        let storage_key = storage_key.to_string();
        Box::pin(async move { Ok(self.objects.read().await.contains_key(&storage_key)) })
    }

    fn size(
        &self,
        storage_key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<u64>> + Send + '_>> {
        let storage_key = storage_key.to_string();
        Box::pin(async move {
            Ok(self
                .objects
                .read()
                .await
                .get(&storage_key)
                .copied()
                .unwrap_or(0))
        })
    }

    fn presign(
        &self,
        storage_key: &str,
        operation: SignedOperation,
        token: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let storage_key = storage_key.to_string();
        let token = token.map(|t| t.to_string());
        Box::pin(async move {
            let verb = match operation {
                SignedOperation::Get => "GET",
                SignedOperation::Put => "PUT",
            };
            let url = format!(
                "{}/{}?verb={}&expires_in={}",
                self.endpoint,
                storage_key,
                verb,
                self.url_expiry.as_secs()
            );
            Ok(append_token(url, token.as_deref()))
        })
    }
}
