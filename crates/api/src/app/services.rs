use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::Response;
use tracing::info;

use dronedispatch_delivery::RandomSelector;
use dronedispatch_infra::{DispatchEngine, DispatchError, InMemoryStorage, Storage};

use crate::app::errors;
use crate::config::ApiConfig;
use crate::seed;

/// Engine over a runtime-selected backend.
pub type Engine = DispatchEngine<Arc<dyn Storage>, RandomSelector>;

/// Shared state handed to every handler.
pub struct AppServices {
    engine: Engine,
}

impl AppServices {
    pub fn new(store: Arc<dyn Storage>, selector: RandomSelector) -> Self {
        Self {
            engine: DispatchEngine::new(store, selector),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Run an engine operation on the blocking pool and map its error to a response.
    ///
    /// Engine calls are synchronous and may block on storage IO.
    pub async fn call<T, F>(self: Arc<Self>, op: F) -> Result<T, Response>
    where
        T: Send + 'static,
        F: FnOnce(&Engine) -> Result<T, DispatchError> + Send + 'static,
    {
        match tokio::task::spawn_blocking(move || op(&self.engine)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(errors::dispatch_error_to_response(e)),
            Err(e) => Err(errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                e.to_string(),
            )),
        }
    }
}

pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let store: Arc<dyn Storage> = match &config.database_url {
        Some(url) => persistent_store(url).await?,
        None => Arc::new(InMemoryStorage::new()),
    };

    if config.seed_demo {
        let seed_store = store.clone();
        tokio::task::spawn_blocking(move || seed::seed_demo_data(&*seed_store)).await??;
    }

    let selector = match config.rng_seed {
        Some(seed) => RandomSelector::seeded(seed),
        None => RandomSelector::from_entropy(),
    };

    Ok(AppServices::new(store, selector))
}

#[cfg(feature = "postgres")]
async fn persistent_store(database_url: &str) -> anyhow::Result<Arc<dyn Storage>> {
    let store = dronedispatch_infra::store::PostgresStorage::connect(database_url).await?;
    store.ensure_schema().await?;
    info!("using postgres storage");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn persistent_store(_database_url: &str) -> anyhow::Result<Arc<dyn Storage>> {
    tracing::warn!("DATABASE_URL set but postgres feature not enabled, falling back to in-memory");
    info!("using in-memory storage");
    Ok(Arc::new(InMemoryStorage::new()))
}
