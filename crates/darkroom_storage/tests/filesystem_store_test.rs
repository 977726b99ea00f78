//! Tests for the filesystem content store.

use bytes::Bytes;
use darkroom_core::{BlobUpload, PhotoId, PhotoMetadata, VariantSize};
use darkroom_interface::ContentStore;
use darkroom_storage::FileSystemContentStore;
use tempfile::TempDir;

fn upload(business_id: &str) -> BlobUpload {
    BlobUpload {
        filename: "storefront.png".to_string(),
        metadata: PhotoMetadata::for_upload("image/png", business_id, Some("Front".into())),
    }
}

#[tokio::test]
async fn test_upload_and_download() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemContentStore::new(temp_dir.path())
        .unwrap()
        .with_chunk_size(7);

    let data = Bytes::from_static(b"Hello, darkroom! This spans several chunks.");
    let id = store.upload(upload("b-1"), data.clone()).await.unwrap();

    let download = store.open_download(&id).await.unwrap();
    assert_eq!(download.photo().id, id);
    assert_eq!(download.photo().length, data.len() as u64);
    assert_eq!(download.photo().content_type(), "image/png");

    let (photo, bytes) = download.read_to_end().await.unwrap();
    assert_eq!(bytes, data);
    assert_eq!(photo.metadata.caption.as_deref(), Some("Front"));
    assert_eq!(store.backend_name(), "filesystem");
}

#[tokio::test]
async fn test_missing_blob_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemContentStore::new(temp_dir.path()).unwrap();

    let err = store.open_download(&PhotoId::new()).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(store.find(&PhotoId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_set_metadata_field_targets_one_key() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemContentStore::new(temp_dir.path()).unwrap();
    let id = store
        .upload(upload("b-1"), Bytes::from_static(b"png"))
        .await
        .unwrap();
    let variant = PhotoId::new();

    assert!(
        store
            .set_metadata_field(&id, "640", &variant.to_string())
            .await
            .unwrap()
    );
    assert!(
        !store
            .set_metadata_field(&PhotoId::new(), "640", &variant.to_string())
            .await
            .unwrap()
    );

    let photo = store.find(&id).await.unwrap().unwrap();
    assert_eq!(photo.metadata.variant(VariantSize::Edge640), Some(variant));
    assert_eq!(photo.metadata.business_id.as_deref(), Some("b-1"));
    assert_eq!(photo.metadata.caption.as_deref(), Some("Front"));
}

#[tokio::test]
async fn test_find_by_owner_filters_business() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemContentStore::new(temp_dir.path()).unwrap();

    let first = store.upload(upload("b-1"), Bytes::from_static(b"1")).await.unwrap();
    let second = store.upload(upload("b-1"), Bytes::from_static(b"2")).await.unwrap();
    store.upload(upload("b-2"), Bytes::from_static(b"3")).await.unwrap();

    let mut ids: Vec<_> = store
        .find_by_owner("b-1")
        .await
        .unwrap()
        .into_iter()
        .map(|photo| photo.id)
        .collect();
    ids.sort();
    let mut expected = vec![first, second];
    expected.sort();
    assert_eq!(ids, expected);
    assert!(store.find_by_owner("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tampered_blob_fails_hash_check() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemContentStore::new(temp_dir.path()).unwrap();
    let id = store
        .upload(upload("b-1"), Bytes::from_static(b"Original data"))
        .await
        .unwrap();

    let blob = walk(temp_dir.path())
        .into_iter()
        .find(|path| path.extension().is_some_and(|ext| ext == "blob"))
        .unwrap();
    std::fs::write(&blob, b"Tampered data").unwrap();

    let result = store.open_download(&id).await.unwrap().read_to_end().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_unknown_metadata_key_is_tolerated() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemContentStore::new(temp_dir.path()).unwrap();
    let id = store
        .upload(upload("b-1"), Bytes::from_static(b"png"))
        .await
        .unwrap();

    assert!(store.set_metadata_field(&id, "thumbnail", "legacy").await.unwrap());

    let listed = store.find_by_owner("b-1").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].metadata.other_fields()["thumbnail"], "legacy");

    let (photo, bytes) = store.open_download(&id).await.unwrap().read_to_end().await.unwrap();
    assert_eq!(&bytes[..], b"png");
    assert_eq!(photo.metadata.caption.as_deref(), Some("Front"));
}

#[tokio::test]
async fn test_find_by_owner_skips_corrupt_sidecar() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileSystemContentStore::new(temp_dir.path()).unwrap();
    let kept = store
        .upload(upload("b-1"), Bytes::from_static(b"one"))
        .await
        .unwrap();
    let id = store
        .upload(upload("b-1"), Bytes::from_static(b"two"))
        .await
        .unwrap();

    let sidecar = walk(temp_dir.path())
        .into_iter()
        .find(|path| path.file_name().is_some_and(|name| name == format!("{}.json", id).as_str()))
        .unwrap();
    std::fs::write(&sidecar, b"{ not json").unwrap();

    let listed = store.find_by_owner("b-1").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, kept);
}

fn walk(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            found.extend(walk(&path));
        } else {
            found.push(path);
        }
    }
    found
}
