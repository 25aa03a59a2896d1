//! Shared test harness: mock external services plus a real server instance
//!
//! Each integration test binary compiles its own copy, so not every helper
//! is used everywhere.
#![allow(dead_code)]

pub mod config;
pub mod mock_backend;
pub mod mock_cdn;
pub mod mock_gallery;
pub mod server;
