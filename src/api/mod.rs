//! The HTTP API.

use crate::infra::state::AppState;
use axum::Router;

pub mod product;

/// Constructs the API routes.
///
/// The product list is the fallback, so every method and path is answered with it.
pub fn api(state: AppState) -> Router {
    Router::new()
        .fallback(product::product_api::list_products)
        .with_state(state)
}
