//! Infrastructure setup.
//!
//! Turns a [`Config`] into the shared resources the HTTP server needs:
//!
//! 1. Connect the participant store backend (with migrations for `PostgreSQL`,
//!    optional seed file for the in-memory backend)
//! 2. Build the check-in service over it
//!
//! ```rust,ignore
//! let config = Config::from_env()?;
//! let resources = Resources::from_config(&config).await?;
//! let app = build_router(AppState::new(resources.service.clone()));
//! ```

use crate::config::{Config, StorageBackend};
use crate::service::CheckInService;
use crate::store::{
    InMemoryParticipantStore, ParticipantStore, PostgresParticipantStore, StoreError,
};
use gatecheck_core::environment::{Clock, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Shared infrastructure for one server process.
#[derive(Clone)]
pub struct Resources {
    /// Application configuration
    pub config: Arc<Config>,
    /// Time source for attendance timestamps
    pub clock: Arc<dyn Clock>,
    /// Participant store backend
    pub store: Arc<dyn ParticipantStore>,
    /// Check-in and roster service
    pub service: CheckInService,
}

impl Resources {
    /// Connect the configured backend and build the service.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database is unreachable, a migration
    /// fails or the seed file cannot be loaded.
    pub async fn from_config(config: &Config) -> Result<Self, StoreError> {
        let store = connect_store(config).await?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let service =
            CheckInService::from_config(Arc::clone(&store), Arc::clone(&clock), &config.checkin);

        Ok(Self {
            config: Arc::new(config.clone()),
            clock,
            store,
            service,
        })
    }
}

/// Connect the participant store selected by `STORAGE_BACKEND`.
///
/// # Errors
///
/// Returns [`StoreError`] if the backend cannot be prepared.
pub async fn connect_store(config: &Config) -> Result<Arc<dyn ParticipantStore>, StoreError> {
    let storage = &config.storage;

    match storage.backend {
        StorageBackend::Memory => {
            let store = InMemoryParticipantStore::new();
            if let Some(path) = &storage.seed_file {
                let loaded = store.load_seed_file(path).await?;
                info!(path = %path, loaded, "Seeded in-memory participant store");
            } else {
                info!("Using empty in-memory participant store");
            }
            Ok(Arc::new(store))
        },
        StorageBackend::Postgres => {
            info!("Connecting to participant database...");
            let store = PostgresParticipantStore::connect(
                &storage.database_url,
                storage.max_connections,
                storage.min_connections,
                Duration::from_secs(storage.connect_timeout),
            )
            .await?;
            store.migrate().await?;
            info!("Participant database ready");
            Ok(Arc::new(store))
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_without_seed_is_empty() {
        let config = Config::from_lookup(|_| None).unwrap();

        let resources = Resources::from_config(&config).await.unwrap();

        assert_eq!(resources.store.backend(), "memory");
        let summary = resources.service.attendance_summary().await.unwrap();
        assert_eq!(summary.total, 0);
    }

    #[tokio::test]
    async fn missing_seed_file_fails_startup() {
        let config = Config::from_lookup(|key| {
            (key == "SEED_FILE").then(|| "/nonexistent/participants.json".to_string())
        })
        .unwrap();

        assert!(matches!(
            Resources::from_config(&config).await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
