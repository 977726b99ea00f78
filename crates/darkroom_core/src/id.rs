//! Blob identifiers.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Immutable identifier of a blob in the content store.
///
/// Originals and variants share the same id space. On the work queue an id
/// travels as its plain hyphenated string form.
///
/// # Examples
///
/// ```
/// use darkroom_core::PhotoId;
///
/// let id = PhotoId::new();
/// let parsed = PhotoId::parse(&id.to_string());
/// assert_eq!(parsed, Some(id));
/// assert_eq!(PhotoId::parse("not-an-id"), None);
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
#[display("{}", _0)]
pub struct PhotoId(Uuid);

impl PhotoId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id, returning `None` when the text is not a valid id.
    ///
    /// Surrounding whitespace is ignored so queue payloads with a trailing
    /// newline still resolve.
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text.trim()).ok().map(Self)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PhotoId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for PhotoId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid photo id: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_whitespace() {
        let id = PhotoId::new();
        let padded = format!("  {}\n", id);
        assert_eq!(PhotoId::parse(&padded), Some(id));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = PhotoId::new();
        let json = serde_json::to_string(&id).expect("serializable");
        assert_eq!(json, format!("\"{}\"", id));
    }

    #[test]
    fn test_from_str_rejects_object_id_form() {
        // 24-hex ids from other stores are not valid here
        assert!("65f0c1a2b3c4d5e6f7a8b9c0".parse::<PhotoId>().is_err());
    }
}
