//! The metadata document attached to every stored blob.

use crate::{PhotoId, VariantSize};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Mutable side-record attached to a blob.
///
/// Persisted as a flat document:
///
/// ```json
/// { "contentType": "image/png", "businessId": "b-42", "caption": "Storefront",
///   "orig": "…", "128": "…", "256": "…" }
/// ```
///
/// Size keys are strings and optional. An absent key means the variant was
/// not produced (yet), or was deliberately withheld to avoid upscaling.
/// Keys the pipeline does not know, or size keys whose value is not a blob
/// id, are carried along untouched in [`PhotoMetadata::other_fields`].
///
/// # Examples
///
/// ```
/// use darkroom_core::{PhotoId, PhotoMetadata, VariantSize};
///
/// let mut metadata = PhotoMetadata::for_upload("image/png", "b-42", Some("Storefront".into()));
/// let variant = PhotoId::new();
/// metadata.set_variant(VariantSize::Edge128, variant);
///
/// let json = serde_json::to_value(&metadata).unwrap();
/// assert_eq!(json["128"], variant.to_string());
/// assert_eq!(json["businessId"], "b-42");
/// assert!(json.get("256").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "MetadataDocument", into = "MetadataDocument")]
pub struct PhotoMetadata {
    /// MIME type of the stored bytes
    pub content_type: String,
    /// Owning business
    pub business_id: Option<String>,
    /// Free-form caption supplied at upload
    pub caption: Option<String>,
    variants: BTreeMap<VariantSize, PhotoId>,
    other_fields: BTreeMap<String, Value>,
}

/// Wire shape of [`PhotoMetadata`]: named keys plus everything else.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataDocument {
    content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    business_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    caption: Option<String>,
    #[serde(flatten)]
    rest: BTreeMap<String, Value>,
}

impl From<MetadataDocument> for PhotoMetadata {
    fn from(document: MetadataDocument) -> Self {
        let mut variants = BTreeMap::new();
        let mut other_fields = BTreeMap::new();
        for (key, value) in document.rest {
            let size = key.parse::<VariantSize>().ok();
            let id = value.as_str().and_then(PhotoId::parse);
            match (size, id) {
                (Some(size), Some(id)) => {
                    variants.insert(size, id);
                }
                _ => {
                    other_fields.insert(key, value);
                }
            }
        }

        Self {
            content_type: document.content_type,
            business_id: document.business_id,
            caption: document.caption,
            variants,
            other_fields,
        }
    }
}

impl From<PhotoMetadata> for MetadataDocument {
    fn from(metadata: PhotoMetadata) -> Self {
        let mut rest = metadata.other_fields;
        for (size, id) in metadata.variants {
            rest.insert(size.key().to_string(), Value::String(id.to_string()));
        }

        Self {
            content_type: metadata.content_type,
            business_id: metadata.business_id,
            caption: metadata.caption,
            rest,
        }
    }
}

impl PhotoMetadata {
    /// Metadata for a derived blob: content type only.
    pub fn for_variant(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            ..Default::default()
        }
    }

    /// Metadata for a freshly uploaded original.
    pub fn for_upload(
        content_type: impl Into<String>,
        business_id: impl Into<String>,
        caption: Option<String>,
    ) -> Self {
        Self {
            content_type: content_type.into(),
            business_id: Some(business_id.into()),
            caption,
            ..Default::default()
        }
    }

    /// Id of the variant recorded for `size`, if any.
    pub fn variant(&self, size: VariantSize) -> Option<PhotoId> {
        self.variants.get(&size).copied()
    }

    /// Record (or overwrite) the variant id for `size`.
    pub fn set_variant(&mut self, size: VariantSize, id: PhotoId) {
        self.other_fields.remove(size.key());
        self.variants.insert(size, id);
    }

    /// All recorded variants, ordered by size.
    pub fn variants(&self) -> &BTreeMap<VariantSize, PhotoId> {
        &self.variants
    }

    /// Keys outside the pipeline's vocabulary, as stored.
    pub fn other_fields(&self) -> &BTreeMap<String, Value> {
        &self.other_fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_shape_uses_string_keys() {
        let mut metadata = PhotoMetadata::for_upload("image/jpeg", "b-1", None);
        let id = PhotoId::new();
        metadata.set_variant(VariantSize::Orig, id);
        metadata.set_variant(VariantSize::Edge1024, id);

        let json = serde_json::to_value(&metadata).expect("serializable");
        let object = json.as_object().expect("object");
        assert_eq!(object["contentType"], "image/jpeg");
        assert_eq!(object["orig"], id.to_string());
        assert_eq!(object["1024"], id.to_string());
        assert!(!object.contains_key("caption"));
        assert!(!object.contains_key("128"));
    }

    #[test]
    fn test_parses_stored_document() {
        let id = PhotoId::new();
        let raw = format!(
            r#"{{"contentType":"image/png","businessId":"b-9","caption":"hi","640":"{}"}}"#,
            id
        );
        let metadata: PhotoMetadata = serde_json::from_str(&raw).expect("valid document");
        assert_eq!(metadata.business_id.as_deref(), Some("b-9"));
        assert_eq!(metadata.caption.as_deref(), Some("hi"));
        assert_eq!(metadata.variant(VariantSize::Edge640), Some(id));
        assert_eq!(metadata.variant(VariantSize::Edge128), None);
    }

    #[test]
    fn test_unknown_keys_survive_a_round_trip() {
        let id = PhotoId::new();
        let raw = serde_json::json!({
            "contentType": "image/jpeg",
            "businessId": "b-3",
            "thumbnail": "legacy",
            "256": "not-a-blob-id",
            "orig": id.to_string(),
        });

        let metadata: PhotoMetadata = serde_json::from_value(raw.clone()).expect("tolerant parse");
        assert_eq!(metadata.variant(VariantSize::Orig), Some(id));
        assert_eq!(metadata.variant(VariantSize::Edge256), None);
        assert_eq!(metadata.other_fields()["thumbnail"], "legacy");
        assert_eq!(metadata.other_fields()["256"], "not-a-blob-id");

        let json = serde_json::to_value(&metadata).expect("serializable");
        assert_eq!(json, raw);
    }

    #[test]
    fn test_setting_a_variant_replaces_a_stray_value() {
        let raw = r#"{"contentType":"image/png","640":42}"#;
        let mut metadata: PhotoMetadata = serde_json::from_str(raw).expect("tolerant parse");
        let id = PhotoId::new();
        metadata.set_variant(VariantSize::Edge640, id);

        let json = serde_json::to_value(&metadata).expect("serializable");
        assert_eq!(json["640"], id.to_string());
        assert!(metadata.other_fields().is_empty());
    }

    #[test]
    fn test_variant_metadata_has_no_owner() {
        let metadata = PhotoMetadata::for_variant("image/jpeg");
        let json = serde_json::to_value(&metadata).expect("serializable");
        assert_eq!(json, serde_json::json!({ "contentType": "image/jpeg" }));
    }
}
