//! Content store selection.

use darkroom_error::DarkroomResult;
use darkroom_interface::ContentStore;
use darkroom_storage::{FileSystemContentStore, MemoryContentStore};
use darkroom_worker::{StorageBackend, StorageSettings};
use std::sync::Arc;

/// Open the content store named by `[storage]`.
#[tracing::instrument(skip(settings), fields(backend = %settings.backend))]
pub async fn open_store(settings: &StorageSettings) -> DarkroomResult<Arc<dyn ContentStore>> {
    let store: Arc<dyn ContentStore> = match settings.backend {
        StorageBackend::Filesystem => Arc::new(FileSystemContentStore::new(&settings.path)?),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory content store; nothing survives this process");
            Arc::new(MemoryContentStore::new())
        }
        StorageBackend::Postgres => open_postgres(settings).await?,
    };
    tracing::info!("Content store ready");
    Ok(store)
}

#[cfg(feature = "postgres")]
async fn open_postgres(settings: &StorageSettings) -> DarkroomResult<Arc<dyn ContentStore>> {
    let url = settings.database_url.as_deref().ok_or_else(|| {
        darkroom_error::ConfigError::new("storage.database_url is required for postgres")
    })?;
    let store =
        darkroom_database::PostgresContentStore::connect(url, settings.pool_size).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(_settings: &StorageSettings) -> DarkroomResult<Arc<dyn ContentStore>> {
    Err(darkroom_error::ConfigError::new(
        "postgres backend requested but darkroom was built without the `postgres` feature",
    )
    .into())
}
