//! Shared application state.
//!
//! Handed to the router once at startup; handlers pull what they need out of
//! it with [`axum::extract::State`].

use crate::core::product::product_repository::DynProductStore;
use axum::extract::FromRef;

/// Shared application state.
#[derive(Clone, FromRef)]
pub struct AppState {
    products: DynProductStore,
}

impl AppState {
    /// Constructs a new [`AppState`].
    pub fn new(products: DynProductStore) -> Self {
        Self { products }
    }
}
