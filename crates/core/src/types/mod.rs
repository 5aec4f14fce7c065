//! Type-safe wrappers for domain values.

mod id;
mod price;

pub use id::{ProductId, UserId};
pub use price::{Price, PriceError};
