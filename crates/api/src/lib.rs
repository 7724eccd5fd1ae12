//! HTTP ingress for the order-processing pipeline.
//!
//! One synchronous entry point (`POST /orders`) validates and sanitizes a
//! submission, publishes the order-initialization event, and answers 202;
//! everything downstream happens asynchronously in the workers. A read
//! endpoint, health check and Prometheus metrics round out the surface.

pub mod config;
pub mod error;
pub mod routes;
pub mod validation;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use document_store::DocumentStore;
use message_bus::MessageBus;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use workers::PipelineConfig;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, B>(state: Arc<AppState<S, B>>, metrics_handle: PrometheusHandle) -> Router
where
    S: DocumentStore + Clone + 'static,
    B: MessageBus + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::submit::<S, B>))
        .route("/orders/{id}", get(routes::orders::get::<S, B>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the shared ingress state over a store and a broker.
pub fn create_state<S, B>(store: S, bus: B, config: &PipelineConfig) -> Arc<AppState<S, B>>
where
    S: DocumentStore + Clone,
    B: MessageBus,
{
    Arc::new(AppState {
        orders: domain::OrderRepository::new(store, config.order_table.clone()),
        bus,
        initialize_topic: config.initialize_topic.clone(),
    })
}
