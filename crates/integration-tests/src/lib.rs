//! Integration test support for Cartbridge.
//!
//! Provides in-memory doubles for the external collaborators:
//!
//! - [`InMemoryCartBackend`] - cart storage with failure injection and
//!   overlap detection
//! - [`ScriptedAuthProvider`] - auth provider whose event stream the test
//!   drives by hand
//!
//! The actual scenarios live in `tests/`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use cartbridge_core::UserId;
use cartbridge_sync::auth::{
    AuthEvent, AuthProvider, AuthSubscription, Session, SubscribeError, SubscriptionGuard,
};
use cartbridge_sync::backend::CartBackend;
use cartbridge_sync::{CartError, CartLine};

// =============================================================================
// InMemoryCartBackend
// =============================================================================

/// In-memory cart backend.
///
/// Stores carts in a map, records every `put_cart` payload, counts calls,
/// and flags any overlapping (concurrent) backend calls - the synchronizer
/// must never issue them.
#[derive(Clone, Default)]
pub struct InMemoryCartBackend {
    inner: Arc<BackendInner>,
}

#[derive(Default)]
struct BackendInner {
    carts: Mutex<HashMap<UserId, Vec<CartLine>>>,
    puts: Mutex<Vec<(UserId, Vec<CartLine>)>>,
    gets: AtomicU32,
    in_flight: AtomicBool,
    overlap_detected: AtomicBool,
    fail_next_get: Mutex<Option<CartError>>,
    fail_next_put: Mutex<Option<CartError>>,
}

impl InMemoryCartBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user's server-side cart.
    pub fn seed(&self, user_id: UserId, lines: Vec<CartLine>) {
        lock(&self.inner.carts).insert(user_id, lines);
    }

    /// The stored cart for a user, if any.
    #[must_use]
    pub fn cart(&self, user_id: &UserId) -> Option<Vec<CartLine>> {
        lock(&self.inner.carts).get(user_id).cloned()
    }

    /// Every `put_cart` payload seen so far, in order.
    #[must_use]
    pub fn puts(&self) -> Vec<(UserId, Vec<CartLine>)> {
        lock(&self.inner.puts).clone()
    }

    /// Number of `get_cart` calls seen so far.
    #[must_use]
    pub fn get_count(&self) -> u32 {
        self.inner.gets.load(Ordering::SeqCst)
    }

    /// Whether two backend calls ever overlapped.
    #[must_use]
    pub fn overlap_detected(&self) -> bool {
        self.inner.overlap_detected.load(Ordering::SeqCst)
    }

    /// Fail the next `get_cart` with the given error.
    pub fn fail_next_get(&self, err: CartError) {
        *lock(&self.inner.fail_next_get) = Some(err);
    }

    /// Fail the next `put_cart` with the given error.
    pub fn fail_next_put(&self, err: CartError) {
        *lock(&self.inner.fail_next_put) = Some(err);
    }

    /// Mark a call as entered, yielding a few times so any concurrent call
    /// would be observed, then run `op`.
    async fn tracked<T>(&self, op: impl FnOnce(&BackendInner) -> T) -> T {
        if self.inner.in_flight.swap(true, Ordering::SeqCst) {
            self.inner.overlap_detected.store(true, Ordering::SeqCst);
        }
        // Give interleaved tasks a chance to run while this call is "on the
        // wire".
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        let result = op(&self.inner);
        self.inner.in_flight.store(false, Ordering::SeqCst);
        result
    }
}

impl CartBackend for InMemoryCartBackend {
    async fn get_cart(&self, user_id: &UserId) -> Result<Vec<CartLine>, CartError> {
        self.inner.gets.fetch_add(1, Ordering::SeqCst);
        self.tracked(|inner| {
            if let Some(err) = lock(&inner.fail_next_get).take() {
                return Err(err);
            }
            Ok(lock(&inner.carts).get(user_id).cloned().unwrap_or_default())
        })
        .await
    }

    async fn put_cart(&self, user_id: &UserId, lines: &[CartLine]) -> Result<(), CartError> {
        self.tracked(|inner| {
            if let Some(err) = lock(&inner.fail_next_put).take() {
                return Err(err);
            }
            lock(&inner.puts).push((user_id.clone(), lines.to_vec()));
            lock(&inner.carts).insert(user_id.clone(), lines.to_vec());
            Ok(())
        })
        .await
    }
}

// =============================================================================
// ScriptedAuthProvider
// =============================================================================

/// Auth provider whose events are pushed by the test through a channel.
///
/// Dropping the sender ends the stream, which lets `AuthObserver::run`
/// return.
pub struct ScriptedAuthProvider {
    initial: Session,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<(AuthEvent, Session)>>>,
    subscribed: Arc<AtomicBool>,
}

impl ScriptedAuthProvider {
    /// Create a provider reporting `initial` as its current session, plus
    /// the sender used to script events.
    #[must_use]
    pub fn new(initial: Session) -> (Self, mpsc::UnboundedSender<(AuthEvent, Session)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                initial,
                receiver: Mutex::new(Some(rx)),
                subscribed: Arc::new(AtomicBool::new(false)),
            },
            tx,
        )
    }

    /// Whether a subscription is currently registered.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }
}

impl AuthProvider for ScriptedAuthProvider {
    fn current_session(&self) -> Session {
        self.initial.clone()
    }

    fn subscribe(&self) -> Result<AuthSubscription, SubscribeError> {
        let receiver = lock(&self.receiver).take().ok_or_else(|| {
            SubscribeError::ProviderUnavailable("already subscribed".to_string())
        })?;

        self.subscribed.store(true, Ordering::SeqCst);
        let registered = Arc::clone(&self.subscribed);
        Ok(AuthSubscription {
            events: receiver,
            guard: SubscriptionGuard::new(move || registered.store(false, Ordering::SeqCst)),
        })
    }

    async fn sign_out(&self) {}
}

/// A provider that can never establish a subscription.
pub struct UnavailableAuthProvider;

impl AuthProvider for UnavailableAuthProvider {
    fn current_session(&self) -> Session {
        Session::default()
    }

    fn subscribe(&self) -> Result<AuthSubscription, SubscribeError> {
        Err(SubscribeError::ProviderUnavailable(
            "auth backend not configured".to_string(),
        ))
    }

    async fn sign_out(&self) {}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
