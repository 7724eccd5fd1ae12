//! Pipeline entry point: ingress server plus all five workers and the
//! reaper in one process over the in-memory store and broker.

use document_store::InMemoryDocumentStore;
use message_bus::InMemoryMessageBus;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use workers::{
    LeadWorker, OrderWorker, PaymentWorker, PipelineConfig, RunnerSettings, SimulatedGateway,
    StockReaper, StockWorker, UpdateWorker, WorkerRunner,
};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let server_config = api::config::Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(server_config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pipeline configuration: strict environment when present, local
    // names otherwise.
    let config = PipelineConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "incomplete pipeline environment, using local configuration");
        PipelineConfig::local()
    });

    // 4. Store, broker and topic subscriptions
    let store = InMemoryDocumentStore::new();
    let bus = InMemoryMessageBus::new();
    bus.subscribe(&config.initialize_topic, &config.lead_queue)
        .await;
    bus.subscribe(&config.initialize_topic, &config.order_queue)
        .await;

    // 5. Worker and reaper tasks
    let settings = RunnerSettings::from(&config);
    tokio::spawn(
        WorkerRunner::new(
            LeadWorker::new(store.clone(), &config),
            bus.clone(),
            config.lead_queue.clone(),
            settings,
        )
        .run(),
    );
    tokio::spawn(
        WorkerRunner::new(
            OrderWorker::new(store.clone(), bus.clone(), &config),
            bus.clone(),
            config.order_queue.clone(),
            settings,
        )
        .run(),
    );
    tokio::spawn(
        WorkerRunner::new(
            StockWorker::new(store.clone(), &config),
            bus.clone(),
            config.stock_queue.clone(),
            settings,
        )
        .run(),
    );
    tokio::spawn(
        WorkerRunner::new(
            PaymentWorker::new(
                store.clone(),
                bus.clone(),
                SimulatedGateway::default(),
                &config,
            ),
            bus.clone(),
            config.payment_queue.clone(),
            settings,
        )
        .run(),
    );
    tokio::spawn(
        WorkerRunner::new(
            UpdateWorker::new(store.clone(), &config),
            bus.clone(),
            config.update_queue.clone(),
            settings,
        )
        .run(),
    );
    tokio::spawn(StockReaper::new(store.clone(), bus.clone(), &config).run());

    // 6. Ingress server
    let state = api::create_state(store, bus, &config);
    let app = api::create_app(state, metrics_handle);

    let addr = server_config.addr();
    tracing::info!(%addr, "starting ingress server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
