//! Authentication hook and credential primitives.
//!
//! The gateway does not own a credential store.  It exposes [`AuthHook`],
//! a process-wide strategy object holding an optional
//! `(username, password) -> bool` callback.  The callback is registered by
//! the composition root during startup and read on every request; with no
//! callback registered the gateway runs in open-access mode.
//!
//! Also here: HTTP Basic header parsing, constant-time credential
//! comparison, and the HMAC token minted into presigned URLs.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::{Arc, RwLock};
use subtle::ConstantTimeEq;

/// Credential-check callback signature.
pub type CredentialCheck = dyn Fn(&str, &str) -> bool + Send + Sync;

/// Process-wide auth gate.
///
/// Registration happens during process setup; re-registration replaces the
/// previous callback (last writer wins).  While serving, the hook is only
/// read.
#[derive(Default)]
pub struct AuthHook {
    callback: RwLock<Option<Arc<CredentialCheck>>>,
}

impl AuthHook {
    /// Create a hook with no callback registered (open-access mode).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the credential-check callback.  Replaces any previously
    /// registered callback.
    pub fn register<F>(&self, callback: F)
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        *self.callback.write().expect("auth hook lock poisoned") = Some(Arc::new(callback));
    }

    /// Whether a credential-check callback has been registered.
    pub fn is_enabled(&self) -> bool {
        self.callback
            .read()
            .expect("auth hook lock poisoned")
            .is_some()
    }

    /// Run the registered callback against the supplied credentials.
    /// Returns `true` when no callback is registered.
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        let callback = self
            .callback
            .read()
            .expect("auth hook lock poisoned")
            .clone();
        match callback {
            Some(check) => check(username, password),
            None => true,
        }
    }
}

/// Build the built-in credential check comparing against a configured
/// username/password pair in constant time.
pub fn static_credential_check(
    username: String,
    password: String,
) -> impl Fn(&str, &str) -> bool + Send + Sync + 'static {
    move |user, pass| constant_time_eq(user, &username) & constant_time_eq(pass, &password)
}

// -- Basic auth parsing ------------------------------------------------------

/// Parse an `Authorization: Basic <base64>` header value into
/// `(username, password)`.  Returns `None` for any other scheme or a
/// malformed payload.
pub fn basic_credentials(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ").or_else(|| header.strip_prefix("basic "))?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

// -- Credential comparison ---------------------------------------------------

/// Constant-time string equality.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

// -- URL tokens --------------------------------------------------------------

/// Hex HMAC-SHA256 of `data` under `secret`; embedded as the `token` query
/// parameter on presigned URLs so a fronting proxy can check that a URL was
/// minted here.
pub fn url_token(secret: &str, data: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- AuthHook -------------------------------------------------------------

    #[test]
    fn test_hook_disabled_by_default() {
        let hook = AuthHook::new();
        assert!(!hook.is_enabled());
        // Open-access mode: everything passes.
        assert!(hook.authenticate("anyone", "anything"));
    }

    #[test]
    fn test_hook_registered_callback_is_consulted() {
        let hook = AuthHook::new();
        hook.register(|user, pass| user == "alice" && pass == "secret");
        assert!(hook.is_enabled());
        assert!(hook.authenticate("alice", "secret"));
        assert!(!hook.authenticate("alice", "wrong"));
        assert!(!hook.authenticate("bob", "secret"));
    }

    #[test]
    fn test_hook_reregistration_last_writer_wins() {
        let hook = AuthHook::new();
        hook.register(|_, _| false);
        hook.register(|_, _| true);
        assert!(hook.authenticate("anyone", "anything"));
    }

    #[test]
    fn test_static_credential_check() {
        let check = static_credential_check("lfs".to_string(), "hunter2".to_string());
        assert!(check("lfs", "hunter2"));
        assert!(!check("lfs", "hunter3"));
        assert!(!check("lf", "hunter2"));
        assert!(!check("", ""));
    }

    // -- Basic parsing --------------------------------------------------------

    #[test]
    fn test_basic_credentials_roundtrip() {
        // "alice:secret"
        let header = "Basic YWxpY2U6c2VjcmV0";
        assert_eq!(
            basic_credentials(header),
            Some(("alice".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn test_basic_credentials_password_with_colon() {
        // "alice:se:cret" -- only the first colon separates.
        let encoded = base64::engine::general_purpose::STANDARD.encode("alice:se:cret");
        let header = format!("Basic {encoded}");
        assert_eq!(
            basic_credentials(&header),
            Some(("alice".to_string(), "se:cret".to_string()))
        );
    }

    #[test]
    fn test_basic_credentials_rejects_other_schemes() {
        assert_eq!(basic_credentials("Bearer abcdef"), None);
        assert_eq!(basic_credentials("Basic not-base64!!!"), None);
        assert_eq!(basic_credentials(""), None);
    }

    // -- constant_time_eq -----------------------------------------------------

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc123", "abc123"));
        assert!(!constant_time_eq("abc123", "abc124"));
        assert!(!constant_time_eq("abc123", "abc12"));
        assert!(constant_time_eq("", ""));
    }

    // -- url_token ------------------------------------------------------------

    #[test]
    fn test_url_token_deterministic() {
        let a = url_token("secret", "scope/oid");
        let b = url_token("secret", "scope/oid");
        assert_eq!(a, b);
        // 32-byte HMAC-SHA256, hex encoded.
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_url_token_varies_with_inputs() {
        assert_ne!(url_token("secret", "a"), url_token("secret", "b"));
        assert_ne!(url_token("s1", "a"), url_token("s2", "a"));
    }
}
