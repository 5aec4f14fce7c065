//! Cartbridge Sync - cart synchronization state machine.
//!
//! # Architecture
//!
//! A guest cart lives locally (in memory, optionally persisted to disk) and
//! is reconciled with the authoritative server-side cart when the user signs
//! in. Two components cooperate:
//!
//! - [`CartSynchronizer`] owns the cart state machine: local-only state,
//!   server-backed state, and the merge between them.
//! - [`auth::AuthObserver`] watches the authentication event stream and
//!   triggers `load_from_server` then `sync_to_server`, strictly in that
//!   order, once per sign-in transition.
//!
//! Collaborators (auth provider, cart backend, local persistence) are traits
//! so the state machine can be driven against mocks in tests and against
//! [`backend::HttpCartBackend`] in production.
//!
//! # Example
//!
//! ```rust,ignore
//! use cartbridge_sync::{CartSynchronizer, auth::AuthObserver};
//!
//! let cart = CartSynchronizer::new(backend);
//! cart.add_line(ProductId::new("X123"), 2, price)?;
//!
//! // Reconcile on sign-in events from the auth provider.
//! let observer = AuthObserver::attach(&provider, cart.clone());
//! observer.run().await;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod backend;
pub mod error;
pub mod persist;
pub mod state;
mod synchronizer;

pub use error::{CartError, Result};
pub use state::{CartLine, CartOrigin, CartState, MAX_LINE_QUANTITY};
pub use synchronizer::CartSynchronizer;
