//! The cart synchronizer: shared handle around the cart state machine.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, instrument};

use cartbridge_core::{Price, ProductId, UserId};

use crate::auth::Session;
use crate::backend::CartBackend;
use crate::error::CartError;
use crate::persist::LocalCartStore;
use crate::state::CartState;

/// Default deadline for a single backend call.
const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the cart state and reconciles local vs. server views.
///
/// Cheaply cloneable via `Arc`; every clone operates on the same cart. Local
/// edits (`add_line`/`remove_line`) are synchronous; server operations are
/// async and mutually exclusive - while one is in flight every other
/// operation is rejected with [`CartError::SyncInProgress`] rather than
/// racing on the shared state.
pub struct CartSynchronizer<B> {
    inner: Arc<Inner<B>>,
}

// Manual impl: a derived Clone would require B: Clone.
impl<B> Clone for CartSynchronizer<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<B> {
    backend: B,
    timeout: Duration,
    state: Mutex<SyncState>,
}

struct SyncState {
    cart: CartState,
    session: Session,
    sync_in_flight: bool,
}

impl<B: CartBackend> CartSynchronizer<B> {
    /// Create a synchronizer with an empty local cart and no session.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_timeout(backend, DEFAULT_SYNC_TIMEOUT)
    }

    /// Create a synchronizer with a custom backend-call deadline.
    #[must_use]
    pub fn with_timeout(backend: B, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                timeout,
                state: Mutex::new(SyncState {
                    cart: CartState::new(),
                    session: Session::default(),
                    sync_in_flight: false,
                }),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        // Lock poisoning only happens if a panic escaped a critical section;
        // the state itself is still consistent, so recover the guard.
        self.inner
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // =========================================================================
    // Local Mutations
    // =========================================================================

    /// Add units of a product to the cart.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity` for a zero quantity, `QuantityLimitExceeded`
    /// if the line would exceed its cap, or `SyncInProgress` while a server
    /// operation is in flight. Failed calls never mutate state.
    pub fn add_line(
        &self,
        product_id: ProductId,
        quantity: u32,
        unit_price: Price,
    ) -> Result<(), CartError> {
        let mut st = self.lock();
        if st.sync_in_flight {
            return Err(CartError::SyncInProgress);
        }
        st.cart.add_line(product_id, quantity, unit_price)
    }

    /// Remove a product's line from the cart. Absent lines are a no-op.
    ///
    /// # Errors
    ///
    /// Returns `SyncInProgress` while a server operation is in flight.
    pub fn remove_line(&self, product_id: &ProductId) -> Result<bool, CartError> {
        let mut st = self.lock();
        if st.sync_in_flight {
            return Err(CartError::SyncInProgress);
        }
        Ok(st.cart.remove_line(product_id))
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Install the authenticated session used for server operations.
    pub fn set_session(&self, session: Session) {
        self.lock().session = session;
    }

    /// Clear the session. Cart lines are left untouched so the cart
    /// persists for guest use.
    pub fn clear_session(&self) {
        self.lock().session = Session::default();
    }

    /// The session currently installed on the synchronizer.
    #[must_use]
    pub fn session(&self) -> Session {
        self.lock().session.clone()
    }

    // =========================================================================
    // Server Reconciliation
    // =========================================================================

    /// Fetch the authoritative server cart and merge it into the local one.
    ///
    /// On success the origin becomes [`CartOrigin::Merged`]: quantities for
    /// product ids on both sides are summed, one-sided lines are kept as-is.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` without a session, `SyncInProgress` if a
    /// server operation is already in flight, and `Network`/`Server` on
    /// transport or backend failure (never retried here - the caller may).
    #[instrument(skip(self), fields(origin = tracing::field::Empty))]
    pub async fn load_from_server(&self) -> Result<(), CartError> {
        let user_id = self.begin_sync()?;

        let result = self.with_deadline(self.inner.backend.get_cart(&user_id)).await;

        let mut st = self.lock();
        st.sync_in_flight = false;
        let server_lines = result?;

        debug!(lines = server_lines.len(), "merging server cart");
        st.cart.merge_from_server(server_lines);
        tracing::Span::current().record("origin", tracing::field::debug(st.cart.origin()));
        Ok(())
    }

    /// Persist the current cart to the server.
    ///
    /// On success `dirty` is cleared. Idempotent: two calls with no
    /// intervening mutation publish identical carts.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` without a session, `SyncInProgress` if a
    /// server operation is already in flight, and `Network`/`Server` on
    /// failure (`dirty` is kept so the caller can retry).
    #[instrument(skip(self))]
    pub async fn sync_to_server(&self) -> Result<(), CartError> {
        let (user_id, lines) = {
            let mut st = self.lock();
            let user_id = st
                .session
                .user_id
                .clone()
                .ok_or(CartError::Unauthenticated)?;
            if st.sync_in_flight {
                return Err(CartError::SyncInProgress);
            }
            st.sync_in_flight = true;
            (user_id, st.cart.to_lines())
        };

        let result = self
            .with_deadline(self.inner.backend.put_cart(&user_id, &lines))
            .await;

        let mut st = self.lock();
        st.sync_in_flight = false;
        result?;

        debug!(lines = lines.len(), "cart persisted to server");
        st.cart.mark_synced();
        Ok(())
    }

    /// Reserve the in-flight slot and return the session's user id.
    fn begin_sync(&self) -> Result<UserId, CartError> {
        let mut st = self.lock();
        let user_id = st
            .session
            .user_id
            .clone()
            .ok_or(CartError::Unauthenticated)?;
        if st.sync_in_flight {
            return Err(CartError::SyncInProgress);
        }
        st.sync_in_flight = true;
        Ok(user_id)
    }

    /// Run a backend call under the configured deadline. A timeout surfaces
    /// as `Network` rather than hanging indefinitely.
    async fn with_deadline<T>(
        &self,
        fut: impl Future<Output = Result<T, CartError>>,
    ) -> Result<T, CartError> {
        match tokio::time::timeout(self.inner.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CartError::Network(format!(
                "backend call exceeded {}s deadline",
                self.inner.timeout.as_secs()
            ))),
        }
    }

    // =========================================================================
    // Local Persistence (guest carts)
    // =========================================================================

    /// Restore the cart from the local store, replacing the current lines.
    /// No saved cart leaves the state untouched.
    ///
    /// # Errors
    ///
    /// Returns `SyncInProgress` while a server operation is in flight, or
    /// `Persistence` if the store fails.
    pub fn load_local(&self, store: &impl LocalCartStore) -> Result<(), CartError> {
        let lines = store.load()?;
        let mut st = self.lock();
        if st.sync_in_flight {
            return Err(CartError::SyncInProgress);
        }
        if let Some(lines) = lines {
            st.cart = CartState::from_lines(lines);
        }
        Ok(())
    }

    /// Save the current cart lines to the local store.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if the store fails.
    pub fn save_local(&self, store: &impl LocalCartStore) -> Result<(), CartError> {
        let lines = self.lock().cart.to_lines();
        store.save(&lines)
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Snapshot the current cart state.
    #[must_use]
    pub fn cart(&self) -> CartState {
        self.lock().cart.clone()
    }
}
