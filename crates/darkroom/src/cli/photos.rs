//! Photo commands: upload, show, list, fetch and config.

use darkroom::{
    BrokerConnector, ConfigError, DarkroomResult, Ingestor, MediaLookup,
    MetadataAccessor, PhotoCatalog, RedisConnector, SIZE_UNAVAILABLE, StorageError,
    StorageErrorKind, UploadRequest, VariantSize, WorkerConfig, lookup_media, open_store,
};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

fn guess_content_type(file: &Path) -> Option<String> {
    let extension = file.extension()?.to_str()?.to_ascii_lowercase();
    let content_type = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(content_type.to_string())
}

fn to_json(value: &impl serde::Serialize) -> DarkroomResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ConfigError::new(format!("Failed to render JSON: {}", e)).into())
}

/// Store a file as a new original and queue it.
pub async fn upload(
    config: &WorkerConfig,
    file: &Path,
    business_id: String,
    caption: Option<String>,
    content_type: Option<String>,
) -> DarkroomResult<()> {
    let content_type = content_type
        .or_else(|| guess_content_type(file))
        .ok_or_else(|| {
            ConfigError::new(format!(
                "Cannot tell the content type of {}; pass --content-type",
                file.display()
            ))
        })?;
    let data = tokio::fs::read(file).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileRead(format!("{}: {}", file.display(), e)))
    })?;

    let mut request = UploadRequest::new(data, content_type, business_id);
    request.caption = caption;
    request.filename = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    Ingestor::validate(&request)?;

    let store = open_store(&config.storage).await?;
    let catalog: Arc<dyn MetadataAccessor> = Arc::new(PhotoCatalog::new(store));
    let connector = RedisConnector::new(config.redis_streams())?;
    let mut channel = connector.connect().await?;

    let ingestor = Ingestor::new(catalog, config.broker.queue.clone());
    let id = ingestor.ingest(&mut channel, request).await?;
    println!("{}", id);
    Ok(())
}

/// Print one photo as JSON.
pub async fn show(config: &WorkerConfig, id: &str) -> DarkroomResult<()> {
    let store = open_store(&config.storage).await?;
    let catalog = PhotoCatalog::new(store);
    match catalog.fetch_by_id(id).await? {
        Some(photo) => {
            println!("{}", to_json(&photo)?);
            Ok(())
        }
        None => Err(StorageError::new(StorageErrorKind::NotFound(id.to_string())).into()),
    }
}

/// Print every photo a business owns, with media paths.
pub async fn list(config: &WorkerConfig, business_id: &str) -> DarkroomResult<()> {
    let store = open_store(&config.storage).await?;
    let catalog = PhotoCatalog::new(store);
    let links: Vec<_> = catalog
        .fetch_by_owner(business_id)
        .await?
        .iter()
        .map(|photo| photo.links())
        .collect();
    println!("{}", to_json(&links)?);
    Ok(())
}

/// Write one rendition to `output` or stdout.
pub async fn fetch(
    config: &WorkerConfig,
    id: &str,
    size: VariantSize,
    output: Option<&Path>,
) -> DarkroomResult<()> {
    let store = open_store(&config.storage).await?;
    let catalog = PhotoCatalog::new(Arc::clone(&store));

    let download = match lookup_media(&catalog, store.as_ref(), id, size).await? {
        MediaLookup::Found(download) => download,
        MediaLookup::NotFound => {
            return Err(StorageError::new(StorageErrorKind::NotFound(id.to_string())).into());
        }
        MediaLookup::SizeUnavailable => {
            return Err(StorageError::new(StorageErrorKind::NotFound(format!(
                "{} ({} {})",
                SIZE_UNAVAILABLE, id, size
            )))
            .into());
        }
    };
    let (photo, data) = download.read_to_end().await?;
    tracing::debug!(variant_id = %photo.id, length = data.len(), "Fetched rendition");

    let written = match output {
        Some(path) => tokio::fs::write(path, &data).await,
        None => {
            let mut stdout = tokio::io::stdout();
            match stdout.write_all(&data).await {
                Ok(()) => stdout.flush().await,
                Err(e) => Err(e),
            }
        }
    };
    written.map_err(|e| StorageError::new(StorageErrorKind::FileWrite(e.to_string())).into())
}

/// Print the effective configuration.
pub fn print_config(config: &WorkerConfig) -> DarkroomResult<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_content_type_from_extension() {
        assert_eq!(
            guess_content_type(Path::new("a/B.JPEG")).as_deref(),
            Some("image/jpeg")
        );
        assert_eq!(
            guess_content_type(Path::new("x.png")).as_deref(),
            Some("image/png")
        );
        assert!(guess_content_type(Path::new("notes.txt")).is_none());
        assert!(guess_content_type(Path::new("noext")).is_none());
    }
}
