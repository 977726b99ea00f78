//! End-to-end derivation over the in-memory store and the raster codec.

use async_trait::async_trait;
use bytes::Bytes;
use darkroom_codec::RasterCodec;
use darkroom_core::{BlobUpload, NewPhoto, NewPhotoBuilder, Photo, PhotoId, VariantSize};
use darkroom_error::{DarkroomResult, StorageError, StorageErrorKind};
use darkroom_interface::{ContentStore, Download, MetadataAccessor};
use darkroom_queue::{Delivery, DeliveryHandler, HandlerOutcome};
use darkroom_storage::{MemoryContentStore, PhotoCatalog, ScratchDir};
use darkroom_worker::{DerivationStage, FailurePolicy, VariantDeriver, VariantOutcome};
use image::{ColorType, DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut buf), format)
        .unwrap();
    buf
}

/// Memory store that refuses uploads whose file name contains a marker.
struct FailingStore {
    inner: MemoryContentStore,
    marker: &'static str,
}

#[async_trait]
impl ContentStore for FailingStore {
    async fn open_download(&self, id: &PhotoId) -> DarkroomResult<Download> {
        self.inner.open_download(id).await
    }

    async fn upload(&self, upload: BlobUpload, data: Bytes) -> DarkroomResult<PhotoId> {
        if upload.filename.contains(self.marker) {
            return Err(StorageError::new(StorageErrorKind::Unavailable(
                "injected failure".to_string(),
            ))
            .into());
        }
        self.inner.upload(upload, data).await
    }

    async fn find(&self, id: &PhotoId) -> DarkroomResult<Option<Photo>> {
        self.inner.find(id).await
    }

    async fn find_by_owner(&self, business_id: &str) -> DarkroomResult<Vec<Photo>> {
        self.inner.find_by_owner(business_id).await
    }

    async fn set_metadata_field(
        &self,
        id: &PhotoId,
        key: &str,
        value: &str,
    ) -> DarkroomResult<bool> {
        self.inner.set_metadata_field(id, key, value).await
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Accessor that errors when recording `refused` and reports the original
/// gone when recording `vanished`.
struct FailingAccessor {
    inner: Arc<dyn MetadataAccessor>,
    refused: VariantSize,
    vanished: VariantSize,
}

#[async_trait]
impl MetadataAccessor for FailingAccessor {
    async fn fetch_by_id(&self, id: &str) -> DarkroomResult<Option<Photo>> {
        self.inner.fetch_by_id(id).await
    }

    async fn fetch_by_owner(&self, business_id: &str) -> DarkroomResult<Vec<Photo>> {
        self.inner.fetch_by_owner(business_id).await
    }

    async fn create(&self, photo: NewPhoto) -> DarkroomResult<PhotoId> {
        self.inner.create(photo).await
    }

    async fn set_variant_reference(
        &self,
        original: &PhotoId,
        size: VariantSize,
        variant: &PhotoId,
    ) -> DarkroomResult<bool> {
        if size == self.refused {
            return Err(StorageError::new(StorageErrorKind::Unavailable(
                "metadata write refused".to_string(),
            ))
            .into());
        }
        if size == self.vanished {
            return Ok(false);
        }
        self.inner.set_variant_reference(original, size, variant).await
    }
}

struct Harness {
    store: Arc<dyn ContentStore>,
    catalog: Arc<dyn MetadataAccessor>,
    scratch: TempDir,
    deriver: VariantDeriver<RasterCodec>,
}

impl Harness {
    fn over(store: Arc<dyn ContentStore>) -> Self {
        let catalog: Arc<dyn MetadataAccessor> = Arc::new(PhotoCatalog::new(Arc::clone(&store)));
        let scratch = TempDir::new().unwrap();
        let deriver = VariantDeriver::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            RasterCodec::new(),
            ScratchDir::new(scratch.path()).unwrap(),
        );
        Self {
            store,
            catalog,
            scratch,
            deriver,
        }
    }

    fn new() -> Self {
        Self::over(Arc::new(MemoryContentStore::new()))
    }

    async fn upload(&self, data: Vec<u8>, content_type: &str) -> PhotoId {
        let photo = NewPhotoBuilder::default()
            .data(data)
            .content_type(content_type)
            .business_id("b-1")
            .build()
            .unwrap();
        self.catalog.create(photo).await.unwrap()
    }

    async fn photo(&self, id: &PhotoId) -> Photo {
        self.catalog
            .fetch_by_id(&id.to_string())
            .await
            .unwrap()
            .unwrap()
    }

    async fn decode_variant(&self, id: &PhotoId) -> DynamicImage {
        let (photo, data) = self
            .store
            .open_download(id)
            .await
            .unwrap()
            .read_to_end()
            .await
            .unwrap();
        assert_eq!(photo.content_type(), "image/jpeg");
        image::load_from_memory_with_format(&data, ImageFormat::Jpeg).unwrap()
    }

    fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch.path()).unwrap().next().is_none()
    }
}

#[tokio::test]
async fn test_large_jpeg_gets_every_size_and_reuses_itself_as_orig() {
    let harness = Harness::new();
    let id = harness.upload(encode(2000, 1500, ImageFormat::Jpeg), "image/jpeg").await;

    let report = harness.deriver.derive(id.to_string().as_bytes()).await;
    assert_eq!(*report.stage(), DerivationStage::Derived);
    assert!(!report.is_fatal());

    let photo = harness.photo(&id).await;
    assert_eq!(photo.metadata.variant(VariantSize::Orig), Some(id));
    for size in VariantSize::DOWNSCALES {
        let variant = photo.metadata.variant(size).unwrap();
        let edge = size.edge().unwrap();
        let image = harness.decode_variant(&variant).await;
        assert_eq!((image.width(), image.height()), (edge, edge));
        assert_eq!(image.color(), ColorType::L8);
    }
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn test_small_png_gets_only_a_new_orig() {
    let harness = Harness::new();
    let id = harness.upload(encode(100, 80, ImageFormat::Png), "image/png").await;

    let report = harness.deriver.derive(id.to_string().as_bytes()).await;
    assert_eq!(report.written(), vec![VariantSize::Orig]);
    for size in VariantSize::DOWNSCALES {
        assert_eq!(report.outcome(size), Some(&VariantOutcome::Skipped));
    }

    let photo = harness.photo(&id).await;
    let orig = photo.metadata.variant(VariantSize::Orig).unwrap();
    assert_ne!(orig, id);
    assert_eq!(photo.metadata.variants().len(), 1);

    let image = harness.decode_variant(&orig).await;
    assert_eq!((image.width(), image.height()), (100, 80));
    assert_eq!(image.color(), ColorType::L8);
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn test_sizes_need_both_sides_strictly_larger() {
    let harness = Harness::new();
    let id = harness.upload(encode(300, 256, ImageFormat::Png), "image/png").await;

    harness.deriver.derive(id.to_string().as_bytes()).await;

    let photo = harness.photo(&id).await;
    assert!(photo.metadata.variant(VariantSize::Edge128).is_some());
    assert!(photo.metadata.variant(VariantSize::Edge256).is_none());
    assert!(photo.metadata.variant(VariantSize::Edge640).is_none());
    assert!(photo.metadata.variant(VariantSize::Edge1024).is_none());
}

#[tokio::test]
async fn test_missing_original_is_acknowledged_without_variants() {
    let harness = Harness::new();
    let missing = PhotoId::new();

    let report = harness.deriver.derive(missing.to_string().as_bytes()).await;
    assert!(report.is_fatal());
    assert_eq!(*report.stage(), DerivationStage::Received);
    assert!(report.outcomes().is_empty());

    let delivery = Delivery {
        tag: "1".to_string(),
        payload: Bytes::from(missing.to_string()),
        redelivered: false,
    };
    assert_eq!(harness.deriver.handle(&delivery).await, HandlerOutcome::Ack);
}

#[tokio::test]
async fn test_garbage_payload_is_fatal() {
    let harness = Harness::new();
    let report = harness.deriver.derive(b"\xff\xfe not an id").await;
    assert!(report.is_fatal());
    assert!(report.original().is_none());
}

#[tokio::test]
async fn test_one_failing_size_leaves_the_others() {
    let store: Arc<dyn ContentStore> = Arc::new(FailingStore {
        inner: MemoryContentStore::new(),
        marker: "_640",
    });
    let harness = Harness::over(store);
    let id = harness.upload(encode(1100, 1100, ImageFormat::Jpeg), "image/jpeg").await;

    let report = harness.deriver.derive(id.to_string().as_bytes()).await;
    assert!(!report.is_fatal());
    assert!(matches!(
        report.outcome(VariantSize::Edge640),
        Some(VariantOutcome::Failed(_))
    ));

    let photo = harness.photo(&id).await;
    assert!(photo.metadata.variant(VariantSize::Edge640).is_none());
    assert!(photo.metadata.variant(VariantSize::Edge128).is_some());
    assert!(photo.metadata.variant(VariantSize::Edge256).is_some());
    assert!(photo.metadata.variant(VariantSize::Edge1024).is_some());
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn test_failed_metadata_writes_leave_the_other_sizes() {
    let harness = Harness::new();
    let id = harness.upload(encode(1100, 1100, ImageFormat::Jpeg), "image/jpeg").await;

    let accessor: Arc<dyn MetadataAccessor> = Arc::new(FailingAccessor {
        inner: Arc::clone(&harness.catalog),
        refused: VariantSize::Edge256,
        vanished: VariantSize::Edge1024,
    });
    let scratch = TempDir::new().unwrap();
    let deriver = VariantDeriver::new(
        Arc::clone(&harness.store),
        accessor,
        RasterCodec::new(),
        ScratchDir::new(scratch.path()).unwrap(),
    );

    let report = deriver.derive(id.to_string().as_bytes()).await;
    assert_eq!(*report.stage(), DerivationStage::Derived);
    assert!(!report.is_fatal());
    assert!(matches!(
        report.outcome(VariantSize::Edge256),
        Some(VariantOutcome::Failed(_))
    ));
    assert!(matches!(
        report.outcome(VariantSize::Edge1024),
        Some(VariantOutcome::Failed(_))
    ));
    assert!(matches!(
        report.outcome(VariantSize::Edge128),
        Some(VariantOutcome::Written(_))
    ));

    let photo = harness.photo(&id).await;
    assert_eq!(photo.metadata.variant(VariantSize::Orig), Some(id));
    assert!(photo.metadata.variant(VariantSize::Edge128).is_some());
    assert!(photo.metadata.variant(VariantSize::Edge640).is_some());
    assert!(photo.metadata.variant(VariantSize::Edge256).is_none());
    assert!(photo.metadata.variant(VariantSize::Edge1024).is_none());
    assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_redelivery_never_removes_a_size() {
    let harness = Harness::new();
    let id = harness.upload(encode(700, 700, ImageFormat::Png), "image/png").await;

    harness.deriver.derive(id.to_string().as_bytes()).await;
    let first = harness.photo(&id).await;
    harness.deriver.derive(id.to_string().as_bytes()).await;
    let second = harness.photo(&id).await;

    let first_keys: Vec<_> = first.metadata.variants().keys().copied().collect();
    let second_keys: Vec<_> = second.metadata.variants().keys().copied().collect();
    assert_eq!(first_keys, second_keys);
    assert_eq!(
        second_keys,
        vec![
            VariantSize::Orig,
            VariantSize::Edge128,
            VariantSize::Edge256,
            VariantSize::Edge640
        ]
    );
}

#[tokio::test]
async fn test_undecodable_original_follows_failure_policy() {
    let harness = Harness::new();
    let mut data = encode(400, 400, ImageFormat::Png);
    data.truncate(data.len() / 2);
    let id = harness.upload(data, "image/png").await;

    let report = harness.deriver.derive(id.to_string().as_bytes()).await;
    assert!(report.is_fatal());
    assert_eq!(*report.stage(), DerivationStage::Downloaded);
    assert!(harness.photo(&id).await.metadata.variants().is_empty());

    let delivery = Delivery {
        tag: "7".to_string(),
        payload: Bytes::from(id.to_string()),
        redelivered: false,
    };
    assert_eq!(harness.deriver.handle(&delivery).await, HandlerOutcome::Ack);

    let Harness {
        store,
        catalog,
        scratch,
        deriver,
    } = harness;
    drop(deriver);
    let dead_letter = VariantDeriver::new(
        store,
        catalog,
        RasterCodec::new(),
        ScratchDir::new(scratch.path()).unwrap(),
    )
    .with_failure_policy(FailurePolicy::DeadLetter);
    assert!(matches!(
        dead_letter.handle(&delivery).await,
        HandlerOutcome::DeadLetter(_)
    ));
}
