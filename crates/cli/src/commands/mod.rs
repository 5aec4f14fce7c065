//! CLI command implementations.

pub mod cart;
