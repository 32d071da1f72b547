//! Git LFS protocol handlers.
//!
//! Per-request orchestration: resolve the project scope and oid into an
//! object reference, query the storage gateway for facts, run the link
//! builder's decision, and serialize the response.  Responses never leak
//! backend identifiers -- only scope, oid, and opaque signed URLs appear.

use std::sync::Arc;

use axum::extract::{OriginalUri, Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::errors::LfsError;
use crate::links::{
    negotiate_upload, verify_object, Link, LinkSet, ObjectBody, UploadDisposition,
};
use crate::locator::ObjectRef;
use crate::storage::backend::{fetch_facts, SignedOperation};
use crate::AppState;

/// Content type of every LFS endpoint.
pub const LFS_CONTENT_TYPE: &str = "application/vnd.git-lfs+json";

// -- Request bodies ----------------------------------------------------------

/// Body of `POST <scope>/objects` (upload negotiation).
#[derive(Debug, Deserialize)]
pub struct ObjectRequest {
    pub oid: String,
    /// Claimed size in bytes.  Optional: a size-less claim is satisfied
    /// by existence alone.
    #[serde(default)]
    pub size: Option<u64>,
}

/// Body of `POST <scope>/verify`.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub oid: String,
    /// Claimed size.  A verify without a size never succeeds against a
    /// stored object; sizes must match exactly.
    #[serde(default)]
    pub size: Option<u64>,
}

// -- Canonical URLs ----------------------------------------------------------

/// Scheme and authority this server is reachable at for the current
/// request.  Scheme comes from deployment config (TLS is terminated in
/// front of the gateway), host from the Host header with the bind address
/// as fallback.
fn base_url(state: &AppState, headers: &HeaderMap) -> String {
    let scheme = if state.config.server.tls { "https" } else { "http" };
    let host = headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .map(|h| h.to_string())
        .unwrap_or_else(|| {
            format!(
                "{}:{}",
                state.config.server.host, state.config.server.port
            )
        });
    format!("{scheme}://{host}")
}

/// Reconstruct the canonical URL of the incoming request, echoed as every
/// response's `self` link.
fn canonical_url(state: &AppState, headers: &HeaderMap, uri: &Uri) -> String {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    format!("{}{path}", base_url(state, headers))
}

/// URL of this server's verify endpoint for `scope`.
fn verify_url(state: &AppState, headers: &HeaderMap, scope: &str) -> String {
    format!(
        "{}{}/verify",
        base_url(state, headers),
        state.scope_path.scoped(scope)
    )
}

/// Mint the URL token for `storage_key`, if a token secret is configured.
fn url_token(state: &AppState, storage_key: &str) -> Option<String> {
    let secret = &state.config.auth.url_token_secret;
    if secret.is_empty() {
        None
    } else {
        Some(crate::auth::url_token(secret, storage_key))
    }
}

/// Serialize an [`ObjectBody`] with the LFS content type.
fn lfs_json(status: StatusCode, body: &ObjectBody) -> Result<Response, LfsError> {
    let json = serde_json::to_string(body).map_err(|e| LfsError::Internal(e.into()))?;
    Ok((status, [("content-type", LFS_CONTENT_TYPE)], json).into_response())
}

// -- Handlers ----------------------------------------------------------------

/// `GET /` -- plain-text liveness message.
pub async fn root() -> impl IntoResponse {
    "Git LFS gateway is online."
}

/// `GET <scope>/objects/:oid` -- download resolution.
///
/// 200 with `self` + `download` links when the object exists, 404
/// otherwise.
pub async fn get_object(
    State(state): State<Arc<AppState>>,
    Path((scope, oid)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<Response, LfsError> {
    let object = ObjectRef::resolve(&scope, &oid)?;
    let key = object.storage_key();

    let facts = fetch_facts(state.storage.as_ref(), &key)
        .await
        .map_err(LfsError::StorageUnavailable)?;
    if !facts.exists {
        return Err(LfsError::ObjectNotFound);
    }

    let token = url_token(&state, &key);
    let download = state
        .storage
        .presign(&key, SignedOperation::Get, token.as_deref())
        .await
        .map_err(LfsError::StorageUnavailable)?;

    let body = ObjectBody {
        oid: object.oid().to_string(),
        size: Some(facts.size),
        links: LinkSet::for_download(
            Link::plain(canonical_url(&state, &headers, &uri)),
            Link::signed(download, state.config.storage.url_expiry_seconds),
        ),
    };
    lfs_json(StatusCode::OK, &body)
}

/// `POST <scope>/objects` -- upload negotiation.
///
/// 200 with download links when the object already satisfies the claim,
/// 202 with `upload` + `verify` links when the client has to send it.
pub async fn post_objects(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Response, LfsError> {
    let request: ObjectRequest =
        serde_json::from_slice(&body).map_err(|e| LfsError::InvalidRequest {
            message: format!("invalid upload request: {e}"),
        })?;

    let object = ObjectRef::resolve(&scope, &request.oid)?;
    let key = object.storage_key();

    let facts = fetch_facts(state.storage.as_ref(), &key)
        .await
        .map_err(LfsError::StorageUnavailable)?;
    let disposition = negotiate_upload(facts, request.size);

    let self_link = Link::plain(canonical_url(&state, &headers, &uri));
    let token = url_token(&state, &key);
    let expiry = state.config.storage.url_expiry_seconds;

    let body = match disposition {
        UploadDisposition::AlreadyUploaded => {
            let download = state
                .storage
                .presign(&key, SignedOperation::Get, token.as_deref())
                .await
                .map_err(LfsError::StorageUnavailable)?;
            ObjectBody {
                oid: object.oid().to_string(),
                size: Some(facts.size),
                links: LinkSet::for_download(self_link, Link::signed(download, expiry)),
            }
        }
        UploadDisposition::NeedsUpload => {
            let upload = state
                .storage
                .presign(&key, SignedOperation::Put, token.as_deref())
                .await
                .map_err(LfsError::StorageUnavailable)?;
            ObjectBody {
                oid: object.oid().to_string(),
                size: request.size,
                links: LinkSet::for_upload(
                    self_link,
                    Link::signed(upload, expiry),
                    Link::plain(verify_url(&state, &headers, object.scope())),
                ),
            }
        }
    };
    lfs_json(disposition.status(), &body)
}

/// `POST <scope>/verify` -- post-upload verification.
///
/// 200 when the object exists with exactly the claimed size, 404 for any
/// other combination.  Success body is empty.
pub async fn post_verify(
    State(state): State<Arc<AppState>>,
    Path(scope): Path<String>,
    body: axum::body::Bytes,
) -> Result<Response, LfsError> {
    let request: VerifyRequest =
        serde_json::from_slice(&body).map_err(|e| LfsError::InvalidRequest {
            message: format!("invalid verify request: {e}"),
        })?;

    let object = ObjectRef::resolve(&scope, &request.oid)?;

    let facts = fetch_facts(state.storage.as_ref(), &object.storage_key())
        .await
        .map_err(LfsError::StorageUnavailable)?;

    let verified = match request.size {
        Some(claimed) => verify_object(facts, claimed),
        None => false,
    };
    if !verified {
        return Err(LfsError::ObjectNotFound);
    }

    Ok((StatusCode::OK, [("content-type", LFS_CONTENT_TYPE)], "").into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_request_parses_without_size() {
        let request: ObjectRequest = serde_json::from_str(r#"{"oid": "abc"}"#).unwrap();
        assert_eq!(request.oid, "abc");
        assert_eq!(request.size, None);
    }

    #[test]
    fn test_object_request_parses_with_size() {
        let request: ObjectRequest =
            serde_json::from_str(r#"{"oid": "abc", "size": 123456}"#).unwrap();
        assert_eq!(request.size, Some(123456));
    }

    #[test]
    fn test_object_request_rejects_non_numeric_size() {
        // A size of the wrong type is a request error, never a comparison
        // in the caller's favor.
        assert!(serde_json::from_str::<ObjectRequest>(r#"{"oid": "abc", "size": "123456"}"#)
            .is_err());
        assert!(serde_json::from_str::<ObjectRequest>(r#"{"oid": "abc", "size": -1}"#).is_err());
    }

    #[test]
    fn test_verify_request_rejects_missing_oid() {
        assert!(serde_json::from_str::<VerifyRequest>(r#"{"size": 5}"#).is_err());
    }
}
