//! PaperLedger API Gateway
//!
//! The HTTP entry point of the service.
//! Handles:
//! - Paper catalogue (create, list, search, fetch, content download)
//! - File uploads into blob storage with ledger topic registration
//! - LLM-backed chat over the catalogue
//! - Quote and payment sessions used by the agent
//! - Observability (logging, metrics)

mod extract;
mod handlers;
mod middleware;
#[cfg(test)]
mod tests;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use paperledger_common::{
    billing::{self, PaymentProcessor},
    config::{AppConfig, ObservabilityConfig},
    db::{DbPool, MemoryStore, PaperStore, Repository, SessionStore},
    errors::{AppError, Result},
    ledger::{self, Ledger},
    llm::{self, ChatModel},
    metrics,
    storage::{BlobStore, FsBlobStore, MemoryBlobStore},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Room for multipart boundaries and metadata fields on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub papers: Arc<dyn PaperStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub ledger: Option<Arc<dyn Ledger>>,
    pub registry_topic: Option<String>,
    pub chat_model: Arc<dyn ChatModel>,
    pub payments: Arc<dyn PaymentProcessor>,
}

impl AppState {
    /// The ledger client, or 503 when none is configured
    pub fn require_ledger(&self) -> Result<&Arc<dyn Ledger>> {
        self.ledger.as_ref().ok_or(AppError::LedgerUnavailable)
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    init_tracing(&config.observability);

    info!("Starting PaperLedger API Gateway v{}", paperledger_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        prometheus_builder()?
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }
    metrics::register_metrics();

    let config = Arc::new(config);
    let state = build_state(config.clone()).await.map_err(|e| {
        tracing::error!(error = %e, "Startup failed");
        e
    })?;

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Connect every adapter. Any failure here is fatal.
async fn build_state(config: Arc<AppConfig>) -> Result<AppState> {
    let (papers, sessions): (Arc<dyn PaperStore>, Arc<dyn SessionStore>) =
        if config.uses_memory_database() {
            warn!("Using the in-memory document store; data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        } else {
            let pool = DbPool::new(&config.database).await?;
            pool.ensure_schema().await?;
            let repo = Arc::new(Repository::new(pool));
            (repo.clone(), repo)
        };

    let blobs: Arc<dyn BlobStore> = match config.storage.provider.as_str() {
        "fs" => Arc::new(
            FsBlobStore::new(&config.storage.blob_dir, config.server.max_upload_bytes).await?,
        ),
        "memory" => Arc::new(MemoryBlobStore::new(config.server.max_upload_bytes)),
        other => {
            return Err(AppError::Configuration {
                message: format!("Unknown storage provider: {}", other),
            })
        }
    };

    let ledger = ledger::create_ledger(&config.ledger)?;
    let handles = match &ledger {
        Some(client) => ledger::bootstrap(client.as_ref(), &config.ledger).await?,
        None => ledger::LedgerHandles::default(),
    };

    let chat_model = llm::create_chat_model(&config.llm)?;
    info!(model = chat_model.model_name(), "Chat model ready");

    let payments = billing::create_payment_processor(
        &config.payment,
        ledger.clone(),
        handles.token_id.clone(),
        config.ledger.token_decimals,
    )?;
    info!(mode = payments.mode(), "Payment processor ready");

    Ok(AppState {
        config,
        papers,
        sessions,
        blobs,
        ledger,
        registry_topic: handles.registry_topic,
        chat_model,
        payments,
    })
}

/// Create the main application router
/// Exporter with request latency buckets by default and wider buckets for
/// LLM and ledger round trips
fn prometheus_builder() -> std::result::Result<PrometheusBuilder, BuildError> {
    let mut builder = PrometheusBuilder::new().set_buckets(metrics::LATENCY_BUCKETS)?;
    for name in metrics::upstream_histograms() {
        builder = builder.set_buckets_for_metric(Matcher::Full(name), metrics::UPSTREAM_BUCKETS)?;
    }
    Ok(builder)
}

fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let upload_limit = DefaultBodyLimit::max(state.config.server.max_upload_bytes + MULTIPART_OVERHEAD);

    let api_routes = Router::new()
        // Paper endpoints
        .route(
            "/papers",
            get(handlers::papers::list_papers).post(handlers::papers::create_paper),
        )
        .route(
            "/papers/upload",
            post(handlers::upload::upload_paper).layer(upload_limit),
        )
        .route("/papers/{id}", get(handlers::papers::get_paper))
        .route("/papers/{id}/content", get(handlers::papers::get_content))
        // Chat endpoint
        .route("/chat", post(handlers::chat::chat))
        // Session endpoints
        .route("/sessions", post(handlers::sessions::create_session))
        .route(
            "/sessions/{id}",
            get(handlers::sessions::get_session).put(handlers::sessions::update_session),
        )
        .route("/sessions/{id}/quote", post(handlers::sessions::quote_session))
        .route("/sessions/{id}/pay", post(handlers::sessions::pay_session));

    // Compose the app
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::errors::redact_server_errors,
        ))
        .layer(axum::middleware::from_fn(middleware::metrics::track_metrics))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.request_timeout(),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
