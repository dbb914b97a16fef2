//! Shiptrack API server entry point.

use std::error::Error;
use std::sync::Arc;

use shiptrack_core::clock::SystemClock;
use shiptrack_core::rng::StdRngSource;
use shiptrack_core::store::ShipmentStore;
use shiptrack_shipments::application::notifications::BroadcastChangeBus;
use shiptrack_shipments::application::repository::ShipmentRepository;
use shiptrack_shipments::application::seed::load_seed_file;
use shiptrack_store::http_blob::HttpBlobStore;
use shiptrack_store::memory::InMemoryShipmentStore;
use shiptrack_store::pg_shipment_store::PgShipmentStore;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use shiptrack_api::config::{AppConfig, StoreBackend};
use shiptrack_api::error::AppError;
use shiptrack_api::state::AppState;
use shiptrack_api::{build_router, telemetry};

async fn connect_store(backend: &StoreBackend) -> Result<Arc<dyn ShipmentStore>, AppError> {
    let store: Arc<dyn ShipmentStore> = match backend {
        StoreBackend::Memory => Arc::new(InMemoryShipmentStore::new()),
        StoreBackend::Http(blob) => Arc::new(HttpBlobStore::new(blob.clone())?),
        StoreBackend::Postgres { database_url } => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await?;
            let store = PgShipmentStore::new(pool);
            store.ensure_schema().await?;
            Arc::new(store)
        }
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::from_env()?;
    let _telemetry = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!(backend = config.backend.name(), "Starting Shiptrack API server");

    let store = connect_store(&config.backend).await?;
    let bus = BroadcastChangeBus::new(config.notify_capacity);
    let repository = Arc::new(ShipmentRepository::new(
        store,
        Arc::new(bus.clone()),
        Arc::new(SystemClock),
        Box::new(StdRngSource::from_os()),
    ));

    if let Some(path) = &config.seed_file {
        let seeds = load_seed_file(path)?;
        let created = repository.seed_if_empty(seeds, Uuid::new_v4()).await?;
        tracing::info!(created, path = %path.display(), "seed file applied");
    }

    let app = build_router(AppState::new(repository, bus));

    let addr = config.socket_addr()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
