//! Auth observer scenarios: event ordering, sign-out, degraded mode.

use rust_decimal::Decimal;

use cartbridge_core::{Price, ProductId, UserId};
use cartbridge_integration_tests::{
    InMemoryCartBackend, ScriptedAuthProvider, UnavailableAuthProvider,
};
use cartbridge_sync::CartSynchronizer;
use cartbridge_sync::auth::{AuthEvent, AuthObserver, Session};

fn price(cents: i64) -> Price {
    Price::new(Decimal::new(cents, 2))
}

fn signed_in(user: &str) -> Session {
    Session::authenticated(UserId::new(user))
}

#[tokio::test]
async fn test_sign_in_event_triggers_load_then_sync() {
    let backend = InMemoryCartBackend::new();
    let sync = CartSynchronizer::new(backend.clone());
    sync.add_line(ProductId::new("X123"), 2, price(1999))
        .expect("guest add");

    let (provider, events) = ScriptedAuthProvider::new(Session::default());
    let observer = AuthObserver::attach(&provider, sync.clone());
    assert!(observer.is_subscribed());

    events
        .send((AuthEvent::SignedIn, signed_in("user-1")))
        .expect("send");
    drop(events);
    observer.run().await;

    // One load, one push, and the server holds the guest lines.
    assert_eq!(backend.get_count(), 1);
    assert_eq!(backend.puts().len(), 1);
    assert!(!sync.cart().is_dirty());
    assert_eq!(
        backend
            .cart(&UserId::new("user-1"))
            .expect("server cart")
            .len(),
        1
    );
}

#[tokio::test]
async fn test_queued_sign_in_events_never_overlap() {
    // Two sign-ins arrive back to back; the second reconciliation must not
    // start until the first fully resolves.
    let backend = InMemoryCartBackend::new();
    let sync = CartSynchronizer::new(backend.clone());

    let (provider, events) = ScriptedAuthProvider::new(Session::default());
    let observer = AuthObserver::attach(&provider, sync);

    events
        .send((AuthEvent::SignedIn, signed_in("user-a")))
        .expect("send");
    events
        .send((AuthEvent::SignedIn, signed_in("user-b")))
        .expect("send");
    drop(events);
    observer.run().await;

    assert_eq!(backend.get_count(), 2, "one load per sign-in transition");
    assert!(!backend.overlap_detected(), "backend calls interleaved");
}

#[tokio::test]
async fn test_sign_out_keeps_local_cart_lines() {
    let backend = InMemoryCartBackend::new();
    let sync = CartSynchronizer::new(backend);
    sync.add_line(ProductId::new("A"), 2, price(1000)).expect("add");

    let (provider, events) = ScriptedAuthProvider::new(signed_in("user-1"));
    let observer = AuthObserver::attach(&provider, sync.clone());

    events
        .send((AuthEvent::SignedOut, Session::default()))
        .expect("send");
    drop(events);
    observer.run().await;

    assert_eq!(sync.session(), Session::default());
    assert_eq!(sync.cart().quantity(&ProductId::new("A")), Some(2));
}

#[tokio::test]
async fn test_initial_load_and_token_refresh_do_not_sync() {
    let backend = InMemoryCartBackend::new();
    let sync = CartSynchronizer::new(backend.clone());

    let (provider, events) = ScriptedAuthProvider::new(Session::default());
    let observer = AuthObserver::attach(&provider, sync);

    events
        .send((AuthEvent::InitialLoad, signed_in("user-1")))
        .expect("send");
    events
        .send((AuthEvent::TokenRefreshed, signed_in("user-1")))
        .expect("send");
    drop(events);
    observer.run().await;

    assert_eq!(backend.get_count(), 0);
    assert!(backend.puts().is_empty());
}

#[tokio::test]
async fn test_unsubscribe_releases_provider_registration() {
    let backend = InMemoryCartBackend::new();
    let (provider, events) = ScriptedAuthProvider::new(Session::default());

    let observer = AuthObserver::attach(&provider, CartSynchronizer::new(backend));
    assert!(provider.is_subscribed());

    drop(events);
    observer.run().await; // stream ends, observer (and guard) dropped
    assert!(!provider.is_subscribed());
}

#[tokio::test]
async fn test_unavailable_provider_degrades_without_blocking() {
    let backend = InMemoryCartBackend::new();
    let sync = CartSynchronizer::new(backend.clone());

    let observer = AuthObserver::attach(&UnavailableAuthProvider, sync.clone());
    assert!(!observer.is_subscribed());
    assert_eq!(observer.session(), &Session::default());

    // run() returns immediately; guest cart editing still works.
    observer.run().await;
    sync.add_line(ProductId::new("A"), 1, price(1000)).expect("add");
    assert_eq!(backend.get_count(), 0);
}
