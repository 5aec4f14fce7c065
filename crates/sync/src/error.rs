//! Cart synchronization error types.
//!
//! Local validation errors (`InvalidQuantity`, `QuantityLimitExceeded`) are
//! rejected synchronously and never mutate state. Transport and server
//! errors are surfaced to the caller for retry messaging - the synchronizer
//! never retries automatically (avoids duplicate writes) and never swallows
//! them.

use thiserror::Error;

use cartbridge_core::ProductId;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Line quantity must be at least 1.
    #[error("quantity must be at least 1, got {quantity}")]
    InvalidQuantity {
        /// The rejected quantity.
        quantity: u32,
    },

    /// Adding the requested quantity would exceed the per-line cap.
    #[error("quantity limit exceeded for {product_id}: requested {requested}, max {max}")]
    QuantityLimitExceeded {
        /// Product whose line would overflow.
        product_id: ProductId,
        /// Total quantity that was requested.
        requested: u64,
        /// Maximum quantity allowed per line.
        max: u32,
    },

    /// No authenticated session is present.
    #[error("no authenticated session")]
    Unauthenticated,

    /// Transport-level failure (connection, DNS, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The cart backend rejected the request.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code returned by the backend.
        status: u16,
        /// Backend error message.
        message: String,
    },

    /// A server sync is already in flight; retry after it completes.
    #[error("sync already in progress, retry later")]
    SyncInProgress,

    /// Local cart persistence failed.
    #[error("local persistence error: {0}")]
    Persistence(String),
}

/// Result type alias for cart operations.
pub type Result<T> = std::result::Result<T, CartError>;
