//! Axum router construction and LFS route mapping.
//!
//! The [`app`] function mounts the three LFS endpoints under the
//! deployment-configured scope prefix, wires the unscoped infrastructure
//! endpoints, and stacks the middleware: auth gate innermost, then common
//! response headers, request tracing outermost.

use axum::{
    http::{HeaderValue, Request},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::auth::basic_credentials;
use crate::errors::{generate_request_id, LfsError};
use crate::handlers::lfs;
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

/// Build the axum [`Router`] with all gateway routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    // LFS endpoints, mounted under the scope template so the :scope path
    // parameter binds the project scope on every request.
    let lfs_routes = Router::new()
        .route("/objects/:oid", get(lfs::get_object))
        .route("/objects", post(lfs::post_objects))
        .route("/verify", post(lfs::post_verify));

    Router::new()
        // Liveness message, mirrored from the LFS reference servers.
        .route("/", get(lfs::root))
        // Infrastructure endpoints (not part of the LFS protocol).
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .nest(&state.scope_path.route_prefix(), lfs_routes)
        // Metrics are recorded per matched route template; route_layer
        // runs after routing so the template is available.
        .route_layer(middleware::from_fn(metrics_middleware))
        // Application state shared across all handlers.
        .with_state(state.clone())
        // Layer ordering: inner layers run first, outer layers wrap them.
        // auth_middleware is innermost (closest to handlers, after routing).
        .layer(middleware::from_fn_with_state(state, auth_middleware))
        // common_headers_middleware adds standard response headers.
        .layer(middleware::from_fn(common_headers_middleware))
        // Request tracing is outermost.
        .layer(TraceLayer::new_for_http())
}

// -- Common headers middleware -----------------------------------------------

/// Tower middleware that adds common response headers to every response:
/// - `x-request-id`: 16-character uppercase hex string
/// - `Date`: RFC 7231 formatted timestamp
/// - `Server`: `lfs-gateway`
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    // Only set x-request-id if not already present (error handler may set it)
    if !headers.contains_key("x-request-id") {
        let request_id = generate_request_id();
        headers.insert("x-request-id", HeaderValue::from_str(&request_id).unwrap());
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    // Always overwrite Date and Server to ensure consistency
    headers.insert("date", HeaderValue::from_str(&date).unwrap());
    headers.insert("server", HeaderValue::from_static("lfs-gateway"));

    response
}

// -- Auth middleware ---------------------------------------------------------

/// Paths that bypass authentication.
const AUTH_SKIP_PATHS: &[&str] = &["/health", "/metrics"];

/// Credential gate consulted before every LFS handler.
///
/// With no callback registered the gateway runs in open-access mode and
/// every request passes.  With one registered, requests must carry Basic
/// credentials that satisfy it; anything else is a 401 with the Basic
/// challenge.
async fn auth_middleware(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, LfsError> {
    let path = req.uri().path();

    // Skip auth for infrastructure endpoints.
    if AUTH_SKIP_PATHS.iter().any(|skip| path == *skip) {
        return Ok(next.run(req).await);
    }

    if !state.auth.is_enabled() {
        return Ok(next.run(req).await);
    }

    let credentials = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(basic_credentials);

    match credentials {
        Some((username, password)) if state.auth.authenticate(&username, &password) => {
            debug!("Auth OK for user {}", username);
            Ok(next.run(req).await)
        }
        Some((username, _)) => {
            debug!("Auth rejected for user {}", username);
            Err(LfsError::Unauthorized)
        }
        None => Err(LfsError::Unauthorized),
    }
}

// -- Health check ------------------------------------------------------------

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
async fn health_check() -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{static_credential_check, AuthHook};
    use crate::config::Config;
    use crate::handlers::lfs::LFS_CONTENT_TYPE;
    use crate::locator::ScopePath;
    use crate::storage::backend::{ObjectStore, SignedOperation};
    use crate::storage::memory::MemoryObjectStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;
    use tower::util::ServiceExt;

    const EXISTING_OID: &str =
        "087a4597b239a1ab0e916956f187c7d404b3c3b8aaf3b1fb99027ec1d19cbb59";
    const EXISTING_SIZE: u64 = 123456;
    const MISSING_OID: &str =
        "0000000000000000000000000000000000000000000000000000000000000000";
    const PROJECT_SCOPE: &str = "10e3eeeb-f55c-4191-8966-17577093642e";
    const PROJECT_PATH: &str = "/api/projects/10e3eeeb-f55c-4191-8966-17577093642e/lfs";
    const STORAGE_ENDPOINT: &str = "https://test-bucket.s3.us-west-2.amazonaws.com";

    fn test_state() -> (Arc<AppState>, Arc<MemoryObjectStore>) {
        let config: Config = serde_yaml::from_str("storage:\n  backend: memory").unwrap();
        let scope_path = ScopePath::parse(&config.server.scope_path).unwrap();
        let store = Arc::new(MemoryObjectStore::new(
            STORAGE_ENDPOINT,
            Duration::from_secs(900),
        ));
        let state = Arc::new(AppState {
            config,
            scope_path,
            storage: store.clone(),
            auth: AuthHook::new(),
        });
        (state, store)
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(path)
            .header("host", "lfs.example.com")
            .body(Body::empty())
            .unwrap()
    }

    fn post(path: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header("host", "lfs.example.com")
            .header("content-type", LFS_CONTENT_TYPE)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root_returns_online_message() {
        let (state, _) = test_state();
        let response = app(state).oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"Git LFS gateway is online.");
    }

    #[tokio::test]
    async fn test_download_existing_object() {
        let (state, store) = test_state();
        store
            .insert(&format!("{PROJECT_SCOPE}/{EXISTING_OID}"), EXISTING_SIZE)
            .await;

        let url = format!("{PROJECT_PATH}/objects/{EXISTING_OID}");
        let response = app(state).oneshot(get(&url)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap(),
            LFS_CONTENT_TYPE
        );
        let data = body_json(response).await;
        assert_eq!(data["oid"], EXISTING_OID);
        assert_eq!(data["size"], EXISTING_SIZE);
        assert!(data["_links"]["self"]["href"]
            .as_str()
            .unwrap()
            .ends_with(&url));
        assert!(data["_links"]["download"]["href"]
            .as_str()
            .unwrap()
            .contains("amazonaws.com"));
        assert!(data["_links"].get("upload").is_none());
    }

    #[tokio::test]
    async fn test_download_missing_object() {
        let (state, _) = test_state();

        let url = format!("{PROJECT_PATH}/objects/{MISSING_OID}");
        let response = app(state).oneshot(get(&url)).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let data = body_json(response).await;
        assert_eq!(data["message"], "Object not found");
        assert!(data.get("_links").is_none());
    }

    #[tokio::test]
    async fn test_upload_negotiation_missing_object() {
        let (state, _) = test_state();

        let body = format!(r#"{{"oid": "{MISSING_OID}"}}"#);
        let response = app(state)
            .oneshot(post(&format!("{PROJECT_PATH}/objects"), &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let data = body_json(response).await;
        assert!(data["_links"]["upload"]["href"]
            .as_str()
            .unwrap()
            .contains("amazonaws.com"));
        let verify = data["_links"]["verify"]["href"].as_str().unwrap();
        assert!(verify.contains("/verify"));
        // The verify link points back at this server's scoped endpoint.
        assert!(verify.contains(PROJECT_SCOPE));
        assert!(data["_links"].get("download").is_none());
    }

    #[tokio::test]
    async fn test_upload_negotiation_already_uploaded() {
        let (state, store) = test_state();
        store
            .insert(&format!("{PROJECT_SCOPE}/{EXISTING_OID}"), EXISTING_SIZE)
            .await;

        let body = format!(r#"{{"oid": "{EXISTING_OID}", "size": {EXISTING_SIZE}}}"#);
        let response = app(state)
            .oneshot(post(&format!("{PROJECT_PATH}/objects"), &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let data = body_json(response).await;
        assert!(data["_links"]["download"]["href"]
            .as_str()
            .unwrap()
            .contains("amazonaws.com"));
        assert!(data["_links"].get("upload").is_none());
        assert!(data["_links"].get("verify").is_none());
    }

    #[tokio::test]
    async fn test_upload_negotiation_size_mismatch_needs_upload() {
        let (state, store) = test_state();
        store
            .insert(&format!("{PROJECT_SCOPE}/{EXISTING_OID}"), EXISTING_SIZE)
            .await;

        let body = format!(r#"{{"oid": "{EXISTING_OID}", "size": 1}}"#);
        let response = app(state)
            .oneshot(post(&format!("{PROJECT_PATH}/objects"), &body))
            .await
            .unwrap();

        // A mismatched claim re-uploads; it is never treated as present.
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let data = body_json(response).await;
        assert!(data["_links"].get("upload").is_some());
    }

    #[tokio::test]
    async fn test_upload_negotiation_existing_object_without_size() {
        let (state, store) = test_state();
        store
            .insert(&format!("{PROJECT_SCOPE}/{EXISTING_OID}"), EXISTING_SIZE)
            .await;

        let body = format!(r#"{{"oid": "{EXISTING_OID}"}}"#);
        let response = app(state)
            .oneshot(post(&format!("{PROJECT_PATH}/objects"), &body))
            .await
            .unwrap();

        // Existence alone satisfies a size-less claim.
        assert_eq!(response.status(), StatusCode::OK);
        let data = body_json(response).await;
        assert_eq!(data["size"], EXISTING_SIZE);
        assert!(data["_links"].get("upload").is_none());
    }

    #[tokio::test]
    async fn test_upload_negotiation_rejects_malformed_body() {
        let (state, _) = test_state();

        let response = app(state)
            .oneshot(post(&format!("{PROJECT_PATH}/objects"), "not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_verify_uploaded_object() {
        let (state, store) = test_state();
        store
            .insert(&format!("{PROJECT_SCOPE}/{EXISTING_OID}"), EXISTING_SIZE)
            .await;

        let body = format!(r#"{{"oid": "{EXISTING_OID}", "size": {EXISTING_SIZE}}}"#);
        let response = app(state)
            .oneshot(post(&format!("{PROJECT_PATH}/verify"), &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_verify_missing_object() {
        let (state, _) = test_state();

        let body = format!(r#"{{"oid": "{MISSING_OID}"}}"#);
        let response = app(state)
            .oneshot(post(&format!("{PROJECT_PATH}/verify"), &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_verify_size_mismatch() {
        let (state, store) = test_state();
        store
            .insert(&format!("{PROJECT_SCOPE}/{EXISTING_OID}"), EXISTING_SIZE)
            .await;

        let body = format!(r#"{{"oid": "{EXISTING_OID}", "size": 123455}}"#);
        let response = app(state)
            .oneshot(post(&format!("{PROJECT_PATH}/verify"), &body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_repeated_download_is_stable() {
        let (state, store) = test_state();
        store
            .insert(&format!("{PROJECT_SCOPE}/{EXISTING_OID}"), EXISTING_SIZE)
            .await;

        let url = format!("{PROJECT_PATH}/objects/{EXISTING_OID}");
        let first = app(state.clone()).oneshot(get(&url)).await.unwrap();
        let second = app(state).oneshot(get(&url)).await.unwrap();

        assert_eq!(first.status(), second.status());
        assert_eq!(body_json(first).await, body_json(second).await);
    }

    // -- Auth gating ----------------------------------------------------------

    #[tokio::test]
    async fn test_auth_rejects_missing_credentials() {
        let (state, _) = test_state();
        state
            .auth
            .register(static_credential_check("lfs".into(), "hunter2".into()));

        let response = app(state).oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response
                .headers()
                .get("www-authenticate")
                .and_then(|v| v.to_str().ok())
                .unwrap(),
            r#"Basic realm="Restricted Area""#
        );
    }

    #[tokio::test]
    async fn test_auth_accepts_valid_credentials() {
        let (state, store) = test_state();
        state
            .auth
            .register(static_credential_check("lfs".into(), "hunter2".into()));
        store
            .insert(&format!("{PROJECT_SCOPE}/{EXISTING_OID}"), EXISTING_SIZE)
            .await;

        // "lfs:hunter2"
        let request = Request::builder()
            .method("GET")
            .uri(format!("{PROJECT_PATH}/objects/{EXISTING_OID}"))
            .header("host", "lfs.example.com")
            .header("authorization", "Basic bGZzOmh1bnRlcjI=")
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_auth_rejects_wrong_password() {
        let (state, _) = test_state();
        state
            .auth
            .register(static_credential_check("lfs".into(), "hunter2".into()));

        // "lfs:wrong"
        let request = Request::builder()
            .method("GET")
            .uri("/")
            .header("authorization", "Basic bGZzOndyb25n")
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_health_bypasses_auth() {
        let (state, _) = test_state();
        state
            .auth
            .register(static_credential_check("lfs".into(), "hunter2".into()));

        let response = app(state).oneshot(get("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    // -- Backend failure propagation -------------------------------------------

    /// Store whose every call fails, standing in for an unreachable backend.
    struct UnavailableStore;

    impl ObjectStore for UnavailableStore {
        fn exists(
            &self,
            _storage_key: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send + '_>> {
            Box::pin(async { Err(anyhow::anyhow!("connect timeout")) })
        }

        fn size(
            &self,
            _storage_key: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<u64>> + Send + '_>> {
            Box::pin(async { Err(anyhow::anyhow!("connect timeout")) })
        }

        fn presign(
            &self,
            _storage_key: &str,
            _operation: SignedOperation,
            _token: Option<&str>,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
            Box::pin(async { Err(anyhow::anyhow!("connect timeout")) })
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_bad_gateway_not_404() {
        let (state, _) = test_state();
        let state = Arc::new(AppState {
            config: state.config.clone(),
            scope_path: state.scope_path.clone(),
            storage: Arc::new(UnavailableStore),
            auth: AuthHook::new(),
        });

        let url = format!("{PROJECT_PATH}/objects/{EXISTING_OID}");
        let response = app(state.clone()).oneshot(get(&url)).await.unwrap();
        // A failed check is a failed request, never a false "not found".
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = format!(r#"{{"oid": "{EXISTING_OID}", "size": {EXISTING_SIZE}}}"#);
        let response = app(state)
            .oneshot(post(&format!("{PROJECT_PATH}/verify"), &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    // -- URL token minting ------------------------------------------------------

    #[tokio::test]
    async fn test_signed_urls_carry_token_when_secret_configured() {
        let (_, store) = test_state();
        let config: Config = serde_yaml::from_str(
            "auth:\n  url_token_secret: sekrit\nstorage:\n  backend: memory",
        )
        .unwrap();
        let scope_path = ScopePath::parse(&config.server.scope_path).unwrap();
        store
            .insert(&format!("{PROJECT_SCOPE}/{EXISTING_OID}"), EXISTING_SIZE)
            .await;
        let state = Arc::new(AppState {
            config,
            scope_path,
            storage: store,
            auth: AuthHook::new(),
        });

        let url = format!("{PROJECT_PATH}/objects/{EXISTING_OID}");
        let response = app(state).oneshot(get(&url)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let data = body_json(response).await;
        let expected = crate::auth::url_token(
            "sekrit",
            &format!("{PROJECT_SCOPE}/{EXISTING_OID}"),
        );
        assert!(data["_links"]["download"]["href"]
            .as_str()
            .unwrap()
            .contains(&format!("token={expected}")));
    }
}
