//! Cartbridge Core - Shared types library.
//!
//! This crate provides common types used across all Cartbridge components:
//! - `sync` - Cart synchronization state machine and collaborator clients
//! - `cli` - Command-line tool for inspecting and syncing carts
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no async.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and prices

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
