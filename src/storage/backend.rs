//! Abstract object store trait.
//!
//! The narrowest capability the gateway needs from a storage backend:
//! existence, size, and presigned URLs.  The core never depends on
//! backend-specific client types, so any object store can be substituted.

use std::future::Future;
use std::pin::Pin;

use crate::links::ObjectFacts;

/// Operation a presigned URL authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedOperation {
    /// URL authorizes an HTTP GET of the object.
    Get,
    /// URL authorizes an HTTP PUT of the object.
    Put,
}

/// Async object store contract.
///
/// Every method reflects the backend's current state; results are never
/// cached.  Failures are backend faults (network, permission, malformed
/// response) and are surfaced as errors -- absence is a `false`/`Ok`
/// answer from `exists`, not an error.
pub trait ObjectStore: Send + Sync + 'static {
    /// Check whether an object exists at `storage_key`.
    fn exists(
        &self,
        storage_key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>>;

    /// Size in bytes of the object at `storage_key`.  Meaningful only for
    /// keys that exist.
    fn size(
        &self,
        storage_key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<u64>> + Send + '_>>;

    /// Produce a presigned URL authorizing `operation` on `storage_key`.
    /// The validity window is fixed at backend construction from
    /// deployment configuration.  A `token`, when given, is embedded in
    /// the URL as a `token` query parameter.
    fn presign(
        &self,
        storage_key: &str,
        operation: SignedOperation,
        token: Option<&str>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>>;
}

/// Fetch existence and size for `storage_key` in one call site.
pub async fn fetch_facts(store: &dyn ObjectStore, storage_key: &str) -> anyhow::Result<ObjectFacts> {
    if store.exists(storage_key).await? {
        Ok(ObjectFacts::present(store.size(storage_key).await?))
    } else {
        Ok(ObjectFacts::missing())
    }
}

/// Append a `token` query parameter to an already-built URL.
pub(crate) fn append_token(url: String, token: Option<&str>) -> String {
    match token {
        None => url,
        Some(token) => {
            let separator = if url.contains('?') { '&' } else { '?' };
            format!("{url}{separator}token={token}")
        }
    }
}
