//! Cart backend collaborator.
//!
//! The backend stores the authoritative per-user cart. The synchronizer only
//! needs two operations, so the seam is a small trait; production code uses
//! [`HttpCartBackend`], tests drive the state machine with in-memory fakes.

mod http;

pub use http::{HttpBackendConfig, HttpCartBackend};

use cartbridge_core::UserId;

use crate::error::CartError;
use crate::state::CartLine;

/// Server-side cart storage for authenticated users.
pub trait CartBackend: Send + Sync {
    /// Fetch the user's cart. An unknown user has an empty cart.
    fn get_cart(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Vec<CartLine>, CartError>> + Send;

    /// Replace the user's cart with the given lines.
    fn put_cart(
        &self,
        user_id: &UserId,
        lines: &[CartLine],
    ) -> impl Future<Output = Result<(), CartError>> + Send;
}
