//! # Data Retrieval Module
//!
//! Generic HTTP retrieval shared by the feed sources: request building, retry
//! with exponential backoff, and raw-body responses.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Generic HTTP API client with retry middleware for resilient network requests.
pub mod ky_http;

pub use ky_http::{ApiClient, ApiResponse, ClientOptions, RetrieveError};
