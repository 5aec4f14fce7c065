//! Local cart persistence for guest carts.
//!
//! Guests accumulate a cart before any session exists; it survives restarts
//! through a [`LocalCartStore`]. The JSON file store is the production
//! implementation; tests may substitute an in-memory one.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::CartError;
use crate::state::{CartDocument, CartLine};

/// Persistence for the guest (pre-sign-in) cart.
pub trait LocalCartStore {
    /// Load the saved cart lines, or `None` if no cart has been saved.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the store exists but cannot be read.
    fn load(&self) -> Result<Option<Vec<CartLine>>, CartError>;

    /// Save the cart lines, replacing any previous save.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the store cannot be written.
    fn save(&self, lines: &[CartLine]) -> Result<(), CartError>;
}

/// Guest cart persisted as a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file backing this store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalCartStore for JsonFileStore {
    fn load(&self) -> Result<Option<Vec<CartLine>>, CartError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            // A missing file just means no cart has been saved yet
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CartError::Persistence(format!(
                    "reading {}: {e}",
                    self.path.display()
                )));
            }
        };

        let document: CartDocument = serde_json::from_slice(&bytes).map_err(|e| {
            CartError::Persistence(format!("parsing {}: {e}", self.path.display()))
        })?;

        debug!(lines = document.lines.len(), "loaded local cart");
        Ok(Some(document.lines))
    }

    fn save(&self, lines: &[CartLine]) -> Result<(), CartError> {
        let document = CartDocument {
            lines: lines.to_vec(),
        };
        let json = serde_json::to_vec_pretty(&document)
            .map_err(|e| CartError::Persistence(e.to_string()))?;

        fs::write(&self.path, json).map_err(|e| {
            CartError::Persistence(format!("writing {}: {e}", self.path.display()))
        })?;

        debug!(lines = lines.len(), "saved local cart");
        Ok(())
    }
}
