//! Object storage backends.
//!
//! The gateway only ever asks three questions of storage: does a key
//! exist, how big is it, and "sign me a URL for it".  [`backend`] defines
//! that contract; [`aws`] implements it against S3, [`memory`] against an
//! in-process map for tests and local development.

pub mod aws;
pub mod backend;
pub mod memory;
