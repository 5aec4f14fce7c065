//! Cart commands: inspect and edit the guest cart, sync with the backend.
//!
//! `show`, `add`, and `remove` operate on the guest cart file alone; only
//! `sync` reaches for the configured backend.

use thiserror::Error;

use cartbridge_core::{Price, PriceError, ProductId};
use cartbridge_sync::auth::Session;
use cartbridge_sync::backend::HttpCartBackend;
use cartbridge_sync::persist::{JsonFileStore, LocalCartStore};
use cartbridge_sync::{CartError, CartState, CartSynchronizer};

use crate::config::CliConfig;

/// Errors produced by cart commands.
#[derive(Debug, Error)]
pub enum CartCommandError {
    /// Cart operation failed.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Price argument could not be parsed.
    #[error("invalid price: {0}")]
    Price(#[from] PriceError),

    /// No user is configured for a server operation.
    #[error("set CARTBRIDGE_USER_ID to sync with the backend")]
    NoUser,

    /// No backend is configured for a server operation.
    #[error("set CARTBRIDGE_BACKEND_URL and CARTBRIDGE_BACKEND_TOKEN to sync with the backend")]
    NoBackend,
}

/// Restore the guest cart from disk.
fn open_local(config: &CliConfig) -> Result<(CartState, JsonFileStore), CartCommandError> {
    let store = JsonFileStore::new(&config.local_cart);
    let cart = store.load()?.map_or_else(CartState::new, CartState::from_lines);
    Ok((cart, store))
}

fn print_cart(cart: &CartState) {
    if cart.is_empty() {
        println!("cart is empty");
        return;
    }
    for line in cart.lines() {
        println!(
            "{:>3} x {}  @ {}",
            line.quantity, line.product_id, line.unit_price_snapshot
        );
    }
    println!(
        "({} lines, origin {:?}, dirty: {})",
        cart.len(),
        cart.origin(),
        cart.is_dirty()
    );
}

/// Print the guest cart.
pub fn show(config: &CliConfig) -> Result<(), CartCommandError> {
    let (cart, _store) = open_local(config)?;
    print_cart(&cart);
    Ok(())
}

/// Add units of a product to the guest cart.
pub fn add(
    config: &CliConfig,
    product_id: &str,
    quantity: u32,
    price: &str,
) -> Result<(), CartCommandError> {
    let unit_price: Price = price.parse()?;
    let (mut cart, store) = open_local(config)?;

    cart.add_line(ProductId::new(product_id), quantity, unit_price)?;
    store.save(&cart.to_lines())?;
    print_cart(&cart);
    Ok(())
}

/// Remove a product from the guest cart.
pub fn remove(config: &CliConfig, product_id: &str) -> Result<(), CartCommandError> {
    let (mut cart, store) = open_local(config)?;

    if !cart.remove_line(&ProductId::new(product_id)) {
        println!("{product_id} was not in the cart");
    }
    store.save(&cart.to_lines())?;
    print_cart(&cart);
    Ok(())
}

/// Reconcile the guest cart with the configured user's server cart.
pub async fn sync(config: &CliConfig) -> Result<(), CartCommandError> {
    let user_id = config.user_id.clone().ok_or(CartCommandError::NoUser)?;
    let backend_config = config.backend.as_ref().ok_or(CartCommandError::NoBackend)?;

    let backend = HttpCartBackend::new(backend_config)?;
    let sync = CartSynchronizer::with_timeout(backend, backend_config.timeout);
    let store = JsonFileStore::new(&config.local_cart);
    sync.load_local(&store)?;

    sync.set_session(Session::authenticated(user_id));
    sync.load_from_server().await?;
    sync.sync_to_server().await?;
    sync.save_local(&store)?;

    print_cart(&sync.cart());
    Ok(())
}
