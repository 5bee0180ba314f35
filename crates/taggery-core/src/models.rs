//! Domain models for the taggery ingestion service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// TAG ENUMS
// =============================================================================

/// Tag category.
///
/// Stored as lowercase TEXT in the `tag.kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    /// Ordinary descriptive label produced by classification or curation.
    Label,
    /// Moderation category; presence of an automated association of this
    /// kind marks the image NSFW.
    Moderation,
}

impl TagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Moderation => "moderation",
        }
    }
}

impl std::fmt::Display for TagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TagKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "label" => Ok(Self::Label),
            "moderation" => Ok(Self::Moderation),
            other => Err(format!("Unknown tag kind: {}", other)),
        }
    }
}

/// Entity kinds a tag may be applied to.
///
/// Stored as a lowercase TEXT[] in the `tag.targets` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TagTarget {
    Image,
    Post,
    Model,
}

impl TagTarget {
    /// Every known target kind. Tags created on first observation apply to
    /// all of them.
    pub const ALL: &'static [TagTarget] = &[Self::Image, Self::Post, Self::Model];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Post => "post",
            Self::Model => "model",
        }
    }
}

impl std::fmt::Display for TagTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TagTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "post" => Ok(Self::Post),
            "model" => Ok(Self::Model),
            other => Err(format!("Unknown tag target: {}", other)),
        }
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// An image record. Owned by the wider platform; this service only reads,
/// updates, and deletes it by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    /// Externally assigned identifier.
    pub id: i64,
    /// When the automated scan pipeline last completed for this image.
    pub scanned_at: Option<DateTime<Utc>>,
    /// Derived moderation flag: true iff an automated moderation-kind tag is
    /// currently associated.
    pub nsfw: bool,
    pub created_at: DateTime<Utc>,
}

/// A tag definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    /// Store-assigned identifier.
    pub id: i64,
    /// Canonical (lower-cased, trimmed) name; unique across the system.
    pub name: String,
    pub kind: TagKind,
    pub targets: Vec<TagTarget>,
    pub created_at: DateTime<Utc>,
}

/// A resolved (id, name) pair, as returned by batched name lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub id: i64,
    pub name: String,
}

/// An image↔tag association row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageTag {
    pub image_id: i64,
    pub tag_id: i64,
    /// Classifier confidence, 0–1.
    pub confidence: f64,
    /// True for machine-generated associations, false for human-curated ones.
    pub automated: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// INGESTION EVENT
// =============================================================================

/// One tag observation reported by the external tagging service.
///
/// An `id` field on the wire, if present, is ignored: identifiers are always
/// resolved server-side from the canonical name.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TagObservation {
    /// Raw tag name as reported (arbitrary casing/whitespace).
    pub tag: String,
    /// Classifier confidence, 0–1.
    pub confidence: f64,
}

/// A completed-scan event delivered by the external tagging service.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanResultEvent {
    /// Image identifier.
    pub id: i64,
    /// False when the classifier rejected the image outright; the image is
    /// then purged and no tags are processed.
    pub is_valid: bool,
    /// Observed tags. Absent and empty are equivalent.
    #[serde(default)]
    pub tags: Option<Vec<TagObservation>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_kind_round_trip() {
        for kind in [TagKind::Label, TagKind::Moderation] {
            let parsed: TagKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_tag_kind_rejects_unknown() {
        assert!("banana".parse::<TagKind>().is_err());
    }

    #[test]
    fn test_tag_target_all_covers_every_variant() {
        assert_eq!(TagTarget::ALL.len(), 3);
        for target in TagTarget::ALL {
            let parsed: TagTarget = target.as_str().parse().unwrap();
            assert_eq!(parsed, *target);
        }
    }

    #[test]
    fn test_scan_event_deserializes_camel_case() {
        let event: ScanResultEvent = serde_json::from_str(
            r#"{"id": 7, "isValid": true, "tags": [{"tag": "Cat", "confidence": 0.97}]}"#,
        )
        .unwrap();
        assert_eq!(event.id, 7);
        assert!(event.is_valid);
        let tags = event.tags.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].tag, "Cat");
    }

    #[test]
    fn test_scan_event_tags_optional() {
        let event: ScanResultEvent =
            serde_json::from_str(r#"{"id": 7, "isValid": false}"#).unwrap();
        assert!(event.tags.is_none());
    }

    #[test]
    fn test_scan_event_ignores_observation_id() {
        // The tagging service sometimes echoes back a tag id; it must not
        // affect deserialization.
        let event: ScanResultEvent = serde_json::from_str(
            r#"{"id": 7, "isValid": true, "tags": [{"tag": "cat", "id": 999, "confidence": 0.5}]}"#,
        )
        .unwrap();
        assert_eq!(event.tags.unwrap()[0].confidence, 0.5);
    }
}
