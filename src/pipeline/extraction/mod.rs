//! Document extraction: the external service's entity graph, the readers
//! that flatten it into lab-report fields, and the clients that fetch it.

pub mod client;
pub mod graph;
pub mod types;

pub use client::*;
pub use graph::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Extraction service is not reachable at {0}")]
    Connection(String),

    #[error("Extraction service returned error (status {status}): {body}")]
    ServiceError { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Extraction timed out after {0}s")]
    Timeout(u64),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction cancelled")]
    Cancelled,
}
