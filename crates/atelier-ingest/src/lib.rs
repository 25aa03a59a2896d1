#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

//! Content-addressed upload of generated image bytes to the CDN
//!
//! Each successful ingest mints a fresh public id; re-ingesting the same
//! bytes produces a distinct stored asset. Idempotence, if wanted, is the
//! caller's concern.

mod error;
mod uploader;

pub use error::{IngestError, Result};
pub use uploader::{Asset, CdnUploader};
