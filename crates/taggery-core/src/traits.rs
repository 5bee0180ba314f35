//! Persistent-store contract required of the storage collaborator.
//!
//! `taggery-db` provides the PostgreSQL implementations; the ingestion
//! pipeline is written against these traits so it can be exercised with
//! in-memory stores in tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{TagKind, TagRef, TagTarget};

/// Repository for image records.
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Delete an image by id. Deleting an absent image is not an error.
    async fn delete(&self, id: i64) -> Result<()>;

    /// Check whether an image currently exists.
    async fn exists(&self, id: i64) -> Result<bool>;

    /// Atomically stamp the image as scanned and recompute its NSFW flag
    /// from the current automated moderation-kind associations.
    ///
    /// Fails with `Error::ImageNotFound` when the image no longer exists.
    async fn mark_scanned(&self, id: i64) -> Result<()>;
}

/// Repository for tag definitions.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Batched lookup of tags by canonical name. Returns (id, name) pairs
    /// for the names that exist; missing names are simply absent from the
    /// result.
    async fn find_by_names(&self, names: &[String]) -> Result<Vec<TagRef>>;

    /// Batched creation of tags by canonical name. A name that already
    /// exists (including one created by a racing request) is skipped, not an
    /// error; callers obtain assigned identifiers by re-querying.
    async fn create_many(
        &self,
        names: &[String],
        kind: TagKind,
        targets: &[TagTarget],
    ) -> Result<()>;
}

/// Repository for image↔tag association rows.
#[async_trait]
pub trait ImageTagRepository: Send + Sync {
    /// Delete every automated association for an image. Human-curated rows
    /// are untouched.
    async fn clear_automated(&self, image_id: i64) -> Result<()>;

    /// Batched upsert of automated associations: one row per
    /// (tag id, confidence) entry, unique on (image, tag), overwriting the
    /// confidence on conflict and leaving the row automated. An empty batch
    /// is a no-op.
    async fn upsert_automated(&self, image_id: i64, entries: &[(i64, f64)]) -> Result<()>;
}
