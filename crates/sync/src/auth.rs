//! Auth session observer.
//!
//! Subscribes to the auth provider's event stream and triggers cart
//! reconciliation exactly once per sign-in transition: `load_from_server`
//! then `sync_to_server`, sequentially, never overlapping. Events are
//! handled one at a time, so a `SignedIn` arriving while a previous
//! reconciliation is still pending queues behind it.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

use cartbridge_core::UserId;

use crate::backend::CartBackend;
use crate::error::CartError;
use crate::synchronizer::CartSynchronizer;

/// The current authentication context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// User identity, if authenticated.
    pub user_id: Option<UserId>,
    /// Whether the session is signed in.
    pub is_authenticated: bool,
}

impl Session {
    /// An authenticated session for the given user.
    #[must_use]
    pub const fn authenticated(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            is_authenticated: true,
        }
    }
}

/// Tags on events emitted by the auth provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// The provider reported its initial session on startup.
    InitialLoad,
    /// The user signed in.
    SignedIn,
    /// The user signed out.
    SignedOut,
    /// The session's token was refreshed.
    TokenRefreshed,
    /// Any other provider event.
    Other,
}

/// Error establishing the auth event subscription.
#[derive(Debug, Error)]
pub enum SubscribeError {
    /// The auth provider is unreachable or not configured.
    #[error("auth provider unavailable: {0}")]
    ProviderUnavailable(String),
}

/// A live subscription to the auth event stream.
///
/// Dropping the subscription (or the observer that owns it) deregisters the
/// provider-side callback via the guard.
pub struct AuthSubscription {
    /// Stream of `(event, resulting session)` pairs.
    pub events: mpsc::UnboundedReceiver<(AuthEvent, Session)>,
    /// Deregistration guard; runs on drop.
    pub guard: SubscriptionGuard,
}

/// Runs a deregistration callback when dropped.
pub struct SubscriptionGuard {
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionGuard {
    /// Create a guard that runs `on_drop` when dropped.
    #[must_use]
    pub fn new(on_drop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_drop: Some(Box::new(on_drop)),
        }
    }

    /// A guard with nothing to deregister.
    #[must_use]
    pub const fn noop() -> Self {
        Self { on_drop: None }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(on_drop) = self.on_drop.take() {
            on_drop();
        }
    }
}

impl std::fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("registered", &self.on_drop.is_some())
            .finish()
    }
}

/// External authentication provider.
pub trait AuthProvider {
    /// The session as the provider currently knows it.
    fn current_session(&self) -> Session;

    /// Subscribe to the auth event stream.
    ///
    /// # Errors
    ///
    /// Returns `ProviderUnavailable` if the subscription cannot be
    /// established (e.g., auth backend not configured).
    fn subscribe(&self) -> Result<AuthSubscription, SubscribeError>;

    /// Sign the current user out. Initiating sign-out is the UI's job; the
    /// observer only reacts to the resulting `SignedOut` event.
    fn sign_out(&self) -> impl Future<Output = ()> + Send;
}

/// Watches authentication state transitions and drives cart reconciliation.
///
/// Holds exactly one subscription per observer lifetime. If the subscription
/// cannot be established the observer stays in a degraded but non-fatal
/// mode: permanently unauthenticated, no retries.
pub struct AuthObserver<B> {
    cart: CartSynchronizer<B>,
    session: Session,
    subscription: Option<AuthSubscription>,
}

impl<B: CartBackend> AuthObserver<B> {
    /// Attach to the provider's event stream and adopt its current session.
    pub fn attach(provider: &impl AuthProvider, cart: CartSynchronizer<B>) -> Self {
        match provider.subscribe() {
            Ok(subscription) => {
                let session = provider.current_session();
                cart.set_session(session.clone());
                Self {
                    cart,
                    session,
                    subscription: Some(subscription),
                }
            }
            Err(e) => {
                warn!(error = %e, "auth subscription failed, running unauthenticated");
                Self {
                    cart,
                    session: Session::default(),
                    subscription: None,
                }
            }
        }
    }

    /// Whether the observer holds a live subscription.
    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// The session as the observer last saw it.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Consume events until the provider closes the stream.
    ///
    /// Events are processed strictly one at a time; reconciliation errors
    /// are logged and surfaced to the UI layer via tracing, never retried
    /// here.
    pub async fn run(mut self) {
        let Some(mut subscription) = self.subscription.take() else {
            debug!("no auth subscription, observer idle");
            return;
        };

        while let Some((event, session)) = subscription.events.recv().await {
            if let Err(e) = self.on_auth_event(event, session).await {
                warn!(error = %e, ?event, "cart reconciliation failed");
            }
        }
    }

    /// React to a single auth event.
    ///
    /// # Errors
    ///
    /// Propagates `load_from_server`/`sync_to_server` failures so callers
    /// can show retry messaging. The session transition itself always
    /// takes effect, even when reconciliation fails.
    #[instrument(skip(self, session), fields(user_id = ?session.user_id))]
    pub async fn on_auth_event(
        &mut self,
        event: AuthEvent,
        session: Session,
    ) -> Result<(), CartError> {
        match event {
            AuthEvent::SignedIn => {
                let is_transition = !(self.session.is_authenticated
                    && self.session.user_id == session.user_id);
                self.session = session.clone();
                self.cart.set_session(session.clone());

                if session.user_id.is_none() || !is_transition {
                    debug!("sign-in without transition, no reconciliation");
                    return Ok(());
                }

                // Load must complete before sync starts, otherwise a stale
                // local cart could overwrite the server copy pre-merge.
                self.cart.load_from_server().await?;
                self.cart.sync_to_server().await?;
                Ok(())
            }
            AuthEvent::SignedOut => {
                // Cart lines are untouched: the cart persists for guest use.
                self.session = Session::default();
                self.cart.clear_session();
                Ok(())
            }
            AuthEvent::InitialLoad | AuthEvent::TokenRefreshed | AuthEvent::Other => {
                self.session = session.clone();
                self.cart.set_session(session);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    struct BrokenProvider;

    impl AuthProvider for BrokenProvider {
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

    struct NullBackend;

    impl CartBackend for NullBackend {
        async fn get_cart(
            &self,
            _user_id: &UserId,
        ) -> Result<Vec<crate::state::CartLine>, CartError> {
            Ok(Vec::new())
        }

        async fn put_cart(
            &self,
            _user_id: &UserId,
            _lines: &[crate::state::CartLine],
        ) -> Result<(), CartError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_subscription_degrades_to_unauthenticated() {
        let cart = CartSynchronizer::new(NullBackend);
        let observer = AuthObserver::attach(&BrokenProvider, cart);

        assert!(!observer.is_subscribed());
        assert_eq!(observer.session(), &Session::default());

        // run() returns immediately instead of blocking forever
        observer.run().await;
    }

    #[test]
    fn test_subscription_guard_runs_on_drop() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&dropped);

        let guard = SubscriptionGuard::new(move || flag.store(true, Ordering::SeqCst));
        assert!(!dropped.load(Ordering::SeqCst));
        drop(guard);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_sign_out_clears_session_only() {
        let cart = CartSynchronizer::new(NullBackend);
        cart.add_line(
            cartbridge_core::ProductId::new("A"),
            2,
            cartbridge_core::Price::zero(),
        )
        .expect("add");

        let mut observer = AuthObserver {
            cart: cart.clone(),
            session: Session::authenticated(UserId::new("user-1")),
            subscription: None,
        };

        observer
            .on_auth_event(AuthEvent::SignedOut, Session::default())
            .await
            .expect("sign out");

        assert_eq!(observer.session(), &Session::default());
        assert_eq!(cart.session(), Session::default());
        assert_eq!(
            cart.cart().quantity(&cartbridge_core::ProductId::new("A")),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_repeated_sign_in_for_same_user_does_not_resync() {
        use std::sync::atomic::AtomicU32;

        struct CountingBackend {
            gets: AtomicU32,
        }

        impl CartBackend for &CountingBackend {
            async fn get_cart(
                &self,
                _user_id: &UserId,
            ) -> Result<Vec<crate::state::CartLine>, CartError> {
                self.gets.fetch_add(1, Ordering::SeqCst);
                Ok(Vec::new())
            }

            async fn put_cart(
                &self,
                _user_id: &UserId,
                _lines: &[crate::state::CartLine],
            ) -> Result<(), CartError> {
                Ok(())
            }
        }

        let backend = CountingBackend {
            gets: AtomicU32::new(0),
        };
        let cart = CartSynchronizer::new(&backend);
        let mut observer = AuthObserver {
            cart,
            session: Session::default(),
            subscription: None,
        };

        let session = Session::authenticated(UserId::new("user-1"));
        observer
            .on_auth_event(AuthEvent::SignedIn, session.clone())
            .await
            .expect("first sign-in");
        observer
            .on_auth_event(AuthEvent::SignedIn, session)
            .await
            .expect("duplicate sign-in");

        assert_eq!(backend.gets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_initial_load_does_not_trigger_sync() {
        use std::sync::atomic::AtomicU32;

        struct CountingBackend {
            gets: AtomicU32,
        }

        impl CartBackend for &CountingBackend {
            async fn get_cart(
                &self,
                _user_id: &UserId,
            ) -> Result<Vec<crate::state::CartLine>, CartError> {
                self.gets.fetch_add(1, Ordering::SeqCst);
                Ok(Vec::new())
            }

            async fn put_cart(
                &self,
                _user_id: &UserId,
                _lines: &[crate::state::CartLine],
            ) -> Result<(), CartError> {
                Ok(())
            }
        }

        let backend = CountingBackend {
            gets: AtomicU32::new(0),
        };
        let cart = CartSynchronizer::new(&backend);
        let mut observer = AuthObserver {
            cart: cart.clone(),
            session: Session::default(),
            subscription: None,
        };

        observer
            .on_auth_event(
                AuthEvent::InitialLoad,
                Session::authenticated(UserId::new("user-1")),
            )
            .await
            .expect("initial load");

        assert_eq!(backend.gets.load(Ordering::SeqCst), 0);
        // But the session is established for later operations
        assert_eq!(cart.session().user_id, Some(UserId::new("user-1")));
    }
}
