//! The product API implementation.

use crate::{
    core::product::product_repository::{DynProductStore, Product},
    infra::error::ApiResult,
};
use axum::{extract::State, response::IntoResponse};
use http::{header, StatusCode};
use tracing::instrument;

/// Lists all products as a JSON array.
///
/// The request itself is ignored. Failures are answered with an empty `500`.
#[instrument(skip_all)]
pub async fn list_products(State(store): State<DynProductStore>) -> ApiResult<impl IntoResponse> {
    let products = store.list_products().await?;
    let body = render_products(&products)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    ))
}

/// Serializes products into the response body.
pub fn render_products(products: &[Product]) -> ApiResult<Vec<u8>> {
    Ok(serde_json::to_vec(products)?)
}
