//! The variant derivation state machine.

use crate::FailurePolicy;
use async_trait::async_trait;
use bytes::Bytes;
use darkroom_core::{BlobUpload, EncodePolicy, ImageKind, ImageProbe, PhotoId, VariantSize};
use darkroom_error::{CodecError, CodecErrorKind, DarkroomResult};
use darkroom_interface::{ContentStore, ImageCodec, MetadataAccessor};
use darkroom_queue::{Delivery, DeliveryHandler, HandlerOutcome};
use darkroom_storage::ScratchDir;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// How far a message got before derivation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, derive_more::Display)]
pub enum DerivationStage {
    /// Payload taken off the queue
    #[display("received")]
    Received,
    /// Original fully buffered
    #[display("downloaded")]
    Downloaded,
    /// Original probed and decoded
    #[display("decoded")]
    Decoded,
    /// Every size attempted
    #[display("derived")]
    Derived,
}

/// Result of attempting one size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantOutcome {
    /// Stored (or, for a JPEG `orig`, reused) and referenced
    Written(PhotoId),
    /// Rendered but not kept: it would have been an upscale
    Skipped,
    /// Render, store or reference update failed
    Failed(String),
}

impl VariantOutcome {
    /// Referenced id, if the size was written.
    pub fn written(&self) -> Option<PhotoId> {
        match self {
            VariantOutcome::Written(id) => Some(*id),
            _ => None,
        }
    }
}

/// What happened to one message.
#[derive(Debug, Clone, PartialEq, Eq, derive_getters::Getters)]
pub struct DerivationReport {
    /// Original the payload named, if it parsed
    original: Option<PhotoId>,
    /// Furthest stage reached
    stage: DerivationStage,
    /// Probed dimensions and format
    probe: Option<ImageProbe>,
    /// Per-size outcomes, only for sizes that were attempted
    outcomes: BTreeMap<VariantSize, VariantOutcome>,
    /// Why the message stopped before derivation, if it did
    failure: Option<String>,
}

impl DerivationReport {
    fn received() -> Self {
        Self {
            original: None,
            stage: DerivationStage::Received,
            probe: None,
            outcomes: BTreeMap::new(),
            failure: None,
        }
    }

    fn fail(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    /// Whether the message failed before any size could be attempted.
    pub fn is_fatal(&self) -> bool {
        self.failure.is_some()
    }

    /// Outcome for one size.
    pub fn outcome(&self, size: VariantSize) -> Option<&VariantOutcome> {
        self.outcomes.get(&size)
    }

    /// Sizes that ended up referenced on the original.
    pub fn written(&self) -> Vec<VariantSize> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.written().is_some())
            .map(|(size, _)| *size)
            .collect()
    }
}

/// Consumes original ids and derives every rendition.
///
/// Each message walks `received → downloaded → decoded`, then attempts
/// `orig` followed by the downscales from largest to smallest. A failure
/// before decoding ends the message under the configured [`FailurePolicy`];
/// a failure of one size is logged and leaves the other sizes untouched.
/// Every rendition passes through the scratch directory and is removed once
/// its outcome is decided.
pub struct VariantDeriver<C: ImageCodec> {
    store: Arc<dyn ContentStore>,
    accessor: Arc<dyn MetadataAccessor>,
    codec: Arc<C>,
    scratch: ScratchDir,
    policy: EncodePolicy,
    failure_policy: FailurePolicy,
}

impl<C: ImageCodec> VariantDeriver<C> {
    /// Create a deriver with the default encode and failure policies.
    pub fn new(
        store: Arc<dyn ContentStore>,
        accessor: Arc<dyn MetadataAccessor>,
        codec: C,
        scratch: ScratchDir,
    ) -> Self {
        Self {
            store,
            accessor,
            codec: Arc::new(codec),
            scratch,
            policy: EncodePolicy::default(),
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Use a different encode policy.
    pub fn with_policy(mut self, policy: EncodePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a different failure policy.
    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Failure policy in use.
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Run one message through the pipeline.
    ///
    /// Never fails: every problem is recorded in the report.
    #[instrument(skip_all, fields(photo_id = tracing::field::Empty))]
    pub async fn derive(&self, payload: &[u8]) -> DerivationReport {
        let report = DerivationReport::received();

        let Some(id) = std::str::from_utf8(payload).ok().and_then(PhotoId::parse) else {
            warn!(payload_len = payload.len(), "Payload is not a photo id");
            return report.fail("payload is not a photo id");
        };
        tracing::Span::current().record("photo_id", tracing::field::display(&id));
        let mut report = DerivationReport {
            original: Some(id),
            ..report
        };

        let data = match self.download(&id).await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, not_found = e.is_not_found(), "Original unavailable");
                return report.fail(e.to_string());
            }
        };
        report.stage = DerivationStage::Downloaded;

        let (probe, decoded) = match self.probe_and_decode(data).await {
            Ok(parts) => parts,
            Err(e) => {
                warn!(error = %e, "Original could not be decoded");
                return report.fail(e.to_string());
            }
        };
        report.stage = DerivationStage::Decoded;
        report.probe = Some(probe);
        debug!(width = probe.width, height = probe.height, kind = %probe.kind, "Decoded original");

        let outcome = self.derive_size(&id, &probe, &decoded, VariantSize::Orig).await;
        report.outcomes.insert(VariantSize::Orig, outcome);

        for size in VariantSize::DOWNSCALES {
            let outcome = self.derive_size(&id, &probe, &decoded, size).await;
            report.outcomes.insert(size, outcome);
        }
        report.stage = DerivationStage::Derived;

        info!(
            written = report.written().len(),
            attempted = report.outcomes.len(),
            "Derivation finished"
        );
        report
    }

    async fn download(&self, id: &PhotoId) -> DarkroomResult<Bytes> {
        let download = self.store.open_download(id).await?;
        let (photo, data) = download.read_to_end().await?;
        debug!(length = photo.length, content_type = photo.content_type(), "Downloaded original");
        Ok(data)
    }

    async fn probe_and_decode(&self, data: Bytes) -> DarkroomResult<(ImageProbe, Arc<C::Decoded>)> {
        let codec = Arc::clone(&self.codec);
        blocking(move || {
            let probe = codec.probe(&data)?;
            let decoded = codec.decode(&data)?;
            Ok((probe, Arc::new(decoded)))
        })
        .await
    }

    #[instrument(skip(self, probe, decoded), fields(photo_id = %original, size = %size))]
    async fn derive_size(
        &self,
        original: &PhotoId,
        probe: &ImageProbe,
        decoded: &Arc<C::Decoded>,
        size: VariantSize,
    ) -> VariantOutcome {
        match self.try_derive_size(original, probe, decoded, size).await {
            Ok(outcome) => {
                match &outcome {
                    VariantOutcome::Written(variant) => {
                        debug!(variant_id = %variant, "Variant recorded")
                    }
                    VariantOutcome::Skipped => debug!("Variant skipped, would upscale"),
                    VariantOutcome::Failed(reason) => warn!(%reason, "Variant failed"),
                }
                outcome
            }
            Err(e) => {
                error!(error = %e, "Variant failed");
                VariantOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_derive_size(
        &self,
        original: &PhotoId,
        probe: &ImageProbe,
        decoded: &Arc<C::Decoded>,
        size: VariantSize,
    ) -> DarkroomResult<VariantOutcome> {
        let (width, height) = match size.edge() {
            Some(edge) => (edge, edge),
            None => (probe.width, probe.height),
        };

        let codec = Arc::clone(&self.codec);
        let image = Arc::clone(decoded);
        let policy = self.policy;
        let rendered = blocking(move || codec.render(&image, width, height, &policy)).await?;

        let scratch = self.scratch.write(original, size, &rendered).await?;
        let result = self.persist(original, probe, size, &scratch).await;
        if let Err(e) = scratch.discard().await {
            warn!(error = %e, "Failed to remove scratch file");
        }
        result
    }

    async fn persist(
        &self,
        original: &PhotoId,
        probe: &ImageProbe,
        size: VariantSize,
        scratch: &darkroom_storage::ScratchFile,
    ) -> DarkroomResult<VariantOutcome> {
        if !size.fits_within(probe.width, probe.height) {
            return Ok(VariantOutcome::Skipped);
        }

        let variant = if size == VariantSize::Orig && probe.kind == ImageKind::Jpeg {
            *original
        } else {
            let data = scratch.read().await?;
            self.store
                .upload(BlobUpload::variant(original, size), data)
                .await?
        };

        if self
            .accessor
            .set_variant_reference(original, size, &variant)
            .await?
        {
            Ok(VariantOutcome::Written(variant))
        } else {
            Ok(VariantOutcome::Failed("original no longer exists".to_string()))
        }
    }
}

/// Run CPU-bound codec work off the async threads.
async fn blocking<T, F>(work: F) -> DarkroomResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> DarkroomResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CodecError::new(CodecErrorKind::Task(e.to_string())))?
}

#[async_trait]
impl<C: ImageCodec> DeliveryHandler for VariantDeriver<C> {
    async fn handle(&self, delivery: &Delivery) -> HandlerOutcome {
        let report = self.derive(&delivery.payload).await;
        match (report.failure(), self.failure_policy) {
            (Some(reason), FailurePolicy::DeadLetter) => HandlerOutcome::DeadLetter(reason.clone()),
            (Some(reason), FailurePolicy::Drop) => {
                info!(%reason, "Dropping message");
                HandlerOutcome::Ack
            }
            (None, _) => HandlerOutcome::Ack,
        }
    }
}
