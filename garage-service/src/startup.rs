use crate::config::GarageConfig;
use crate::models::CatalogKind;
use crate::services::{
    get_metrics, CatalogService, CustomerService, DocumentStore, GarageInfoService,
    InMemoryStore, InvoiceService, JobCardService, MigrationReport, Migrator, MongoDb, PageLimits,
    ProfitService,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use service_core::error::AppError;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Every domain service, sharing one document store.
#[derive(Clone)]
pub struct Garage {
    pub store: Arc<dyn DocumentStore>,
    pub customers: Arc<CustomerService>,
    pub catalog: Arc<CatalogService>,
    pub jobcards: Arc<JobCardService>,
    pub invoices: Arc<InvoiceService>,
    pub profits: ProfitService,
    pub garage_info: Arc<GarageInfoService>,
    pub migrator: Arc<Migrator>,
}

impl Garage {
    pub fn new(store: Arc<dyn DocumentStore>, limits: PageLimits, batch_size: usize) -> Self {
        let profits = ProfitService::new(store.clone());
        let catalog = Arc::new(CatalogService::new(store.clone(), limits));
        Self {
            customers: Arc::new(CustomerService::new(store.clone(), limits)),
            jobcards: Arc::new(JobCardService::new(store.clone())),
            invoices: Arc::new(InvoiceService::new(store.clone(), profits.clone(), limits)),
            garage_info: Arc::new(GarageInfoService::new(store.clone())),
            migrator: Arc::new(Migrator::new(store.clone(), catalog.clone(), batch_size)),
            catalog,
            profits,
            store,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()), PageLimits::default(), 50)
    }

    /// Invoice partition backfill followed by stock and service flattening.
    /// Each routine reports on its own; a failing routine does not stop the
    /// ones after it.
    pub async fn run_migrations(&self) -> Vec<(&'static str, Result<MigrationReport, AppError>)> {
        let log_progress = |routine: &'static str| {
            move |done: usize, total: usize| info!(routine, done, total, "Migration progress")
        };

        vec![
            (
                "invoice_partitions",
                self.migrator
                    .backfill_invoice_partitions(log_progress("invoice_partitions"))
                    .await,
            ),
            (
                "legacy_stocks",
                self.migrator
                    .flatten_legacy_catalog(CatalogKind::Stock, log_progress("legacy_stocks"))
                    .await,
            ),
            (
                "legacy_services",
                self.migrator
                    .flatten_legacy_catalog(CatalogKind::Service, log_progress("legacy_services"))
                    .await,
            ),
        ]
    }
}

#[derive(Clone)]
pub struct AppState {
    pub garage: Garage,
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: GarageConfig) -> Result<Self, AppError> {
        let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to MongoDB: {}", e);
                e
            })?;
        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        let garage = Garage::new(
            Arc::new(db),
            config.pagination.limits(),
            config.migration.batch_size,
        );

        if config.migration.run_on_startup {
            for (routine, result) in garage.run_migrations().await {
                match result {
                    Ok(report) if report.is_clean() => info!(
                        routine,
                        total = report.total,
                        success = report.success,
                        skipped = report.skipped,
                        "Migration finished"
                    ),
                    Ok(report) => warn!(
                        routine,
                        total = report.total,
                        failed = report.failed,
                        errors = ?report.errors,
                        "Migration finished with failures"
                    ),
                    Err(e) => tracing::error!(routine, error = %e, "Migration aborted"),
                }
            }
        }

        Self::serve(garage, config.common.port).await
    }

    /// Bind the health/metrics router for an already wired `Garage`.
    pub async fn serve(garage: Garage, port: u16) -> Result<Self, AppError> {
        let state = AppState { garage };

        let app = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics_endpoint))
            .layer(TraceLayer::new_for_http())
            .with_state(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn garage(&self) -> &Garage {
        &self.state.garage
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.garage.store.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "garage-service",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "service": "garage-service",
                "error": e.to_string()
            })),
        ),
    }
}

async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.garage.store.ping().await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}
