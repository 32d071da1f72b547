//! Link builder: the LFS protocol decision table.
//!
//! Pure functions from backend facts to response shape.  Handlers fetch
//! [`ObjectFacts`] from the storage gateway, run the decision here, then
//! fill in hrefs from the signer.  Nothing in this module performs I/O.

use axum::http::StatusCode;
use serde::Serialize;

/// The result of querying storage for an object reference.  Fetched fresh
/// on every request; `size` is meaningful only when `exists` is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectFacts {
    pub exists: bool,
    pub size: u64,
}

impl ObjectFacts {
    /// Facts for an absent object.
    pub fn missing() -> Self {
        Self {
            exists: false,
            size: 0,
        }
    }

    /// Facts for a present object of the given size.
    pub fn present(size: u64) -> Self {
        Self { exists: true, size }
    }
}

// -- Decisions ---------------------------------------------------------------

/// Outcome of upload negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadDisposition {
    /// The object is already server-side; the client gets download links
    /// and nothing to do.
    AlreadyUploaded,
    /// The object is missing or does not match the claim; the client gets
    /// upload and verify links.
    NeedsUpload,
}

impl UploadDisposition {
    /// Protocol status code for this disposition.
    pub fn status(self) -> StatusCode {
        match self {
            UploadDisposition::AlreadyUploaded => StatusCode::OK,
            UploadDisposition::NeedsUpload => StatusCode::ACCEPTED,
        }
    }
}

/// Upload negotiation: an existing object satisfies a size-less claim, or
/// a claim whose size matches the stored size exactly.  Any size mismatch
/// is treated identically to a missing object -- it triggers re-upload,
/// never a soft warning.
pub fn negotiate_upload(facts: ObjectFacts, claimed_size: Option<u64>) -> UploadDisposition {
    match (facts.exists, claimed_size) {
        (true, None) => UploadDisposition::AlreadyUploaded,
        (true, Some(claimed)) if claimed == facts.size => UploadDisposition::AlreadyUploaded,
        _ => UploadDisposition::NeedsUpload,
    }
}

/// Post-upload verification: the object must exist and the stored size
/// must equal the claimed size exactly.
pub fn verify_object(facts: ObjectFacts, claimed_size: u64) -> bool {
    facts.exists && facts.size == claimed_size
}

// -- Response shape ----------------------------------------------------------

/// One action link.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    /// Validity window in seconds for signed hrefs; absent on plain ones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl Link {
    /// A plain link with no expiry (self, verify).
    pub fn plain(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            expires_in: None,
        }
    }

    /// A signed link carrying its validity window.
    pub fn signed(href: impl Into<String>, expires_in: u64) -> Self {
        Self {
            href: href.into(),
            expires_in: Some(expires_in),
        }
    }
}

/// The `_links` member of an object response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LinkSet {
    /// Canonical URL of the request that produced this response.
    #[serde(rename = "self")]
    pub self_link: Link,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download: Option<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<Link>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify: Option<Link>,
}

impl LinkSet {
    /// Links for an object that is present server-side: `self` + `download`.
    pub fn for_download(self_link: Link, download: Link) -> Self {
        Self {
            self_link,
            download: Some(download),
            upload: None,
            verify: None,
        }
    }

    /// Links for an object the client still has to send: `self` + signed
    /// `upload` + this server's `verify` endpoint.
    pub fn for_upload(self_link: Link, upload: Link, verify: Link) -> Self {
        Self {
            self_link,
            download: None,
            upload: Some(upload),
            verify: Some(verify),
        }
    }
}

/// Response body for object endpoints.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ObjectBody {
    pub oid: String,
    /// Stored size when known; omitted when the object is absent and the
    /// client claimed none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "_links")]
    pub links: LinkSet,
}
