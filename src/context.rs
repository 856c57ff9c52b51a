use std::sync::Arc;

use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::api::{ApiClient, ClientError};
use crate::config::AppConfig;
use crate::core::backend::JobBackend;
use crate::db::JobStore;

/// Per-session state shared by every component.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub api: ApiClient,
    /// Job submission and status lookups. Normally the same client as `api`.
    pub backend: Arc<dyn JobBackend>,
    pub store: JobStore,
    pub session_id: Uuid,
}

impl AppContext {
    pub fn new(config: AppConfig, db: Connection) -> Result<Self, ClientError> {
        let api = ApiClient::new(&config)?;
        let backend: Arc<dyn JobBackend> = Arc::new(api.clone());
        Ok(Self::with_backend(config, db, api, backend))
    }

    pub fn with_backend(
        config: AppConfig,
        db: Connection,
        api: ApiClient,
        backend: Arc<dyn JobBackend>,
    ) -> Self {
        let store = JobStore::new(db, &config);
        Self {
            config: Arc::new(config),
            api,
            backend,
            store,
            session_id: Uuid::now_v7(),
        }
    }
}
