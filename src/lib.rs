//! lfs-gateway library -- Git LFS server backed by object storage.
//!
//! This crate answers the Git LFS single-object batch questions (is this
//! object present, how do I upload it, did it land correctly) by checking
//! an object-storage bucket and minting presigned URLs.  It never streams
//! object bytes itself.

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod links;
pub mod locator;
pub mod metrics;
pub mod server;
pub mod storage;

use crate::auth::AuthHook;
use crate::config::Config;
use crate::locator::ScopePath;
use crate::storage::backend::ObjectStore;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Parsed scope path template the LFS routes are mounted under.
    pub scope_path: ScopePath,
    /// Object storage backend (S3 or in-memory).
    pub storage: Arc<dyn ObjectStore>,
    /// Optional credential-check callback, registered at startup.
    pub auth: AuthHook,
}
