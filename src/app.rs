//! The axum application and how it is started.

use crate::core::product::product_repository::DynProductStore;
use crate::infra::config::{Config, ServerConfig};
use crate::infra::error::PanicHandler;
use crate::infra::lifecycle::{LifecycleError, Shutdown, Supervisor};
use crate::infra::middleware::MakeRequestIdSpan;
use crate::infra::state::AppState;
use axum::Router;
use http::StatusCode;
use std::future::Future;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Constructs the full axum application.
pub fn app(state: AppState, config: &ServerConfig) -> Router {
    crate::api::api(state)
        // A handler that runs out of time is an internal failure, answered like the others.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::INTERNAL_SERVER_ERROR,
            config.write_timeout,
        ))
        .layer(RequestBodyTimeoutLayer::new(config.read_timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(MakeRequestIdSpan)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(()),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(ConcurrencyLimitLayer::new(500))
        .layer(CatchPanicLayer::custom(PanicHandler))
}

/// Binds the configured address and serves products until `shutdown` completes.
pub async fn run_app<F>(
    config: &Config,
    products: DynProductStore,
    shutdown: F,
) -> Result<Shutdown, LifecycleError>
where
    F: Future<Output = ()> + Send,
{
    let supervisor = Supervisor::bind(
        &config.server.bind_address(),
        config.server.shutdown_timeout,
    )
    .await?;
    let app = app(AppState::new(products), &config.server);
    supervisor.run(app, shutdown).await
}
