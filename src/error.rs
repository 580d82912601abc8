//! Error types for Bragfeed
//!
//! This module provides the crate-level error type hierarchy using
//! `thiserror`. Each mechanism owns a narrower error type; this enum is
//! the top-level aggregation used at the binary and server boundary.

use thiserror::Error;

use crate::store::StoreError;
use crate::stripe::error::WebhookError;
use crate::stripe::signature::SignatureError;

/// The main error type for Bragfeed operations
#[derive(Error, Debug)]
pub enum Error {
    /// Durable store errors
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Webhook processing errors
    #[error("webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// Webhook signature errors
    #[error("signature error: {0}")]
    Signature(#[from] SignatureError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for Bragfeed operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a generic error from a string
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Error::Generic(msg.into())
    }
}
