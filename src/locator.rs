//! Object location: project scopes, oids, and storage keys.
//!
//! The only naming logic in the system.  A project scope and an oid are
//! combined verbatim into the storage key `{scope}/{oid}`; neither is
//! normalized or decoded.  The scope itself is extracted from the request
//! path by mounting the LFS routes under the deployment-configured
//! template (see [`ScopePath`]).

use crate::errors::LfsError;

/// Placeholder that marks the project-scope segment in the configured
/// path template.
pub const SCOPE_PLACEHOLDER: &str = "{scope}";

/// Parsed form of the `server.scope_path` template, e.g.
/// `/api/projects/{scope}/lfs`.
#[derive(Debug, Clone)]
pub struct ScopePath {
    template: String,
}

impl ScopePath {
    /// Validate and wrap a path template.  The template must be absolute
    /// and contain the `{scope}` placeholder exactly once.
    pub fn parse(template: &str) -> anyhow::Result<Self> {
        if !template.starts_with('/') {
            anyhow::bail!("scope path template must start with '/': {template}");
        }
        if template.matches(SCOPE_PLACEHOLDER).count() != 1 {
            anyhow::bail!(
                "scope path template must contain the {SCOPE_PLACEHOLDER} placeholder exactly once: {template}"
            );
        }
        Ok(Self {
            template: template.trim_end_matches('/').to_string(),
        })
    }

    /// The template as an axum route prefix, with the placeholder turned
    /// into a `:scope` path parameter.
    pub fn route_prefix(&self) -> String {
        self.template.replace(SCOPE_PLACEHOLDER, ":scope")
    }

    /// The template with the placeholder bound to a concrete scope.
    pub fn scoped(&self, scope: &str) -> String {
        self.template.replace(SCOPE_PLACEHOLDER, scope)
    }
}

/// A resolved object handle: `(scope, oid)` plus the storage key derived
/// from them.  Constructed per request and discarded with the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    scope: String,
    oid: String,
}

impl ObjectRef {
    /// Resolve a scope and oid into an object reference.
    ///
    /// An empty scope means the request path never bound one; that is an
    /// error, never a fallback namespace.  An empty oid is a malformed
    /// request.
    pub fn resolve(scope: &str, oid: &str) -> Result<Self, LfsError> {
        if scope.is_empty() {
            return Err(LfsError::InvalidScope);
        }
        if oid.is_empty() {
            return Err(LfsError::InvalidRequest {
                message: "oid must not be empty".to_string(),
            });
        }
        Ok(Self {
            scope: scope.to_string(),
            oid: oid.to_string(),
        })
    }

    /// The project scope this object belongs to.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The object's content hash identifier.
    pub fn oid(&self) -> &str {
        &self.oid
    }

    /// The backend storage key for this object.
    pub fn storage_key(&self) -> String {
        format!("{}/{}", self.scope, self.oid)
    }
}
