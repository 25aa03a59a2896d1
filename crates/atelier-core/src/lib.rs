#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod context;
mod error;
pub mod retry;

pub use context::RequestContext;
pub use error::HttpError;
pub use retry::{RetryPolicy, Retryable};
