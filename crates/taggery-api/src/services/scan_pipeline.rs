//! Scan-result processing pipeline.
//!
//! Reconciles a completed-scan event from the external tagging service
//! against persistent storage: purges invalid images, rebuilds the automated
//! tag set from the deduplicated observations, resolves tag names to
//! identifiers through the shared cache, and recomputes the image's
//! moderation flag.
//!
//! ## Resolution Order
//!
//! For each canonical tag name, the resolver tries:
//! 1. Cache lookup
//! 2. Batched name lookup against the store
//! 3. Batched creation (conflict-tolerant), then re-query for assigned ids
//!
//! Names that still fail to resolve are dropped from the association step
//! rather than failing the whole event. The store's unique name index is the
//! ultimate arbiter when concurrent events race to create the same tag.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use taggery_core::{
    dedupe_observations, Error, ImageRepository, ImageTagRepository, Result, ScanResultEvent,
    TagCache, TagKind, TagRepository, TagTarget,
};
use taggery_db::Database;

/// Terminal state of a processed scan event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The image was declared invalid and purged (or was already gone).
    Purged,
    /// The valid path completed; `applied` automated associations were
    /// written.
    Processed { applied: usize },
}

/// Pipeline over the persistent-store contract plus the process-wide tag
/// cache. Cheap to clone; all state is shared by reference.
#[derive(Clone)]
pub struct ScanPipeline {
    images: Arc<dyn ImageRepository>,
    tags: Arc<dyn TagRepository>,
    image_tags: Arc<dyn ImageTagRepository>,
    cache: TagCache,
}

impl ScanPipeline {
    pub fn new(
        images: Arc<dyn ImageRepository>,
        tags: Arc<dyn TagRepository>,
        image_tags: Arc<dyn ImageTagRepository>,
        cache: TagCache,
    ) -> Self {
        Self {
            images,
            tags,
            image_tags,
            cache,
        }
    }

    /// Wire the pipeline to the PostgreSQL repositories.
    pub fn from_database(db: &Database, cache: TagCache) -> Self {
        Self::new(
            Arc::new(db.images.clone()),
            Arc::new(db.tags.clone()),
            Arc::new(db.image_tags.clone()),
            cache,
        )
    }

    /// Process one scan event to completion.
    ///
    /// Invalid events purge the image and stop. Valid events clear the prior
    /// automated associations, rebuild them from the deduplicated
    /// observations, and recompute the scanned/NSFW state. Reprocessing the
    /// same image always converges on the current observation set; stale
    /// rows never accumulate.
    pub async fn process(&self, event: &ScanResultEvent) -> Result<ScanOutcome> {
        let start = Instant::now();

        if !event.is_valid {
            self.purge(event.id).await;
            info!(
                subsystem = "pipeline",
                component = "scan_pipeline",
                op = "process",
                image_id = event.id,
                duration_ms = start.elapsed().as_millis() as u64,
                "Invalid image purged"
            );
            return Ok(ScanOutcome::Purged);
        }

        // Full clear before rebuild keeps processing idempotent per image.
        self.image_tags.clear_automated(event.id).await?;

        let observations = event.tags.as_deref().unwrap_or_default();
        let deduped = dedupe_observations(observations);

        let resolved = if deduped.is_empty() {
            Vec::new()
        } else {
            let names: Vec<String> = deduped.keys().cloned().collect();
            self.resolve_tags(&names).await?
        };

        if !resolved.is_empty() {
            let entries: Vec<(i64, f64)> = resolved
                .iter()
                .map(|(name, id)| (*id, deduped[name]))
                .collect();

            if let Err(err) = self.image_tags.upsert_automated(event.id, &entries).await {
                // Distinguish a benign race with deletion elsewhere from a
                // real store fault.
                match self.images.exists(event.id).await {
                    Ok(false) => return Err(Error::ImageNotFound(event.id)),
                    _ => return Err(err),
                }
            }
        }

        // Runs after the upsert has committed: stamps scanned_at and derives
        // the NSFW flag from the association rows just written (or, on the
        // empty path, from their absence).
        self.images.mark_scanned(event.id).await?;

        info!(
            subsystem = "pipeline",
            component = "scan_pipeline",
            op = "process",
            image_id = event.id,
            tag_count = resolved.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Scan result applied"
        );
        Ok(ScanOutcome::Processed {
            applied: resolved.len(),
        })
    }

    /// Best-effort purge: the desired end state is "image gone", so absence
    /// and deletion faults alike are reported as success.
    async fn purge(&self, image_id: i64) {
        if let Err(err) = self.images.delete(image_id).await {
            warn!(
                subsystem = "pipeline",
                component = "scan_pipeline",
                op = "purge",
                image_id,
                error = %err,
                "Image purge failed; treating as already gone"
            );
        }
    }

    /// Resolve canonical tag names to identifiers: cache, then batched
    /// lookup, then batched creation and re-query. Unresolvable names are
    /// dropped.
    async fn resolve_tags(&self, names: &[String]) -> Result<Vec<(String, i64)>> {
        let mut resolved = Vec::with_capacity(names.len());
        let mut unresolved = Vec::new();

        for name in names {
            match self.cache.lookup(name).await {
                Some(id) => resolved.push((name.clone(), id)),
                None => unresolved.push(name.clone()),
            }
        }
        let cache_hits = resolved.len();

        if !unresolved.is_empty() {
            unresolved = self.absorb_matches(&mut resolved, unresolved).await?;
        }

        let mut created = 0;
        if !unresolved.is_empty() {
            // Unseen names: create with the default kind, applicable
            // everywhere, then re-query for the store-assigned ids. A racing
            // duplicate creation is absorbed by the store's unique index.
            created = unresolved.len();
            self.tags
                .create_many(&unresolved, TagKind::Label, TagTarget::ALL)
                .await?;
            unresolved = self.absorb_matches(&mut resolved, unresolved).await?;
        }

        if !unresolved.is_empty() {
            // Store anomaly; downstream steps only act on resolved pairs.
            debug!(
                subsystem = "pipeline",
                component = "resolver",
                dropped_count = unresolved.len(),
                "Dropping unresolvable tag names"
            );
        }

        debug!(
            subsystem = "pipeline",
            component = "resolver",
            tag_count = names.len(),
            cache_hits,
            created_count = created,
            dropped_count = unresolved.len(),
            "Tag resolution complete"
        );
        Ok(resolved)
    }

    /// Query the store for `pending` names; cache and absorb every match
    /// into `resolved`, returning the names that remain unknown.
    async fn absorb_matches(
        &self,
        resolved: &mut Vec<(String, i64)>,
        pending: Vec<String>,
    ) -> Result<Vec<String>> {
        let found = self.tags.find_by_names(&pending).await?;
        let mut matched: std::collections::HashMap<String, i64> =
            found.into_iter().map(|t| (t.name, t.id)).collect();

        let mut remaining = Vec::new();
        for name in pending {
            match matched.remove(&name) {
                Some(id) => {
                    self.cache.insert(&name, id).await;
                    resolved.push((name, id));
                }
                None => remaining.push(name),
            }
        }
        Ok(remaining)
    }
}
