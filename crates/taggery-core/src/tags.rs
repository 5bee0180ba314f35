//! Tag normalization, deduplication, and the shared resolution cache.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::TagObservation;

/// Normalize a raw tag string into its canonical form: lower-cased with
/// leading/trailing whitespace trimmed. Equal canonical forms are the same
/// tag regardless of original formatting.
pub fn normalize_tag_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Collapse an ordered sequence of observations into one entry per canonical
/// name, keeping the highest confidence seen.
///
/// Ties keep the earliest-seen observation: an equal confidence does not
/// overwrite. An empty input yields an empty map.
pub fn dedupe_observations(observations: &[TagObservation]) -> HashMap<String, f64> {
    let mut deduped: HashMap<String, f64> = HashMap::with_capacity(observations.len());
    for obs in observations {
        let name = normalize_tag_name(&obs.tag);
        match deduped.get(&name) {
            Some(existing) if obs.confidence <= *existing => {}
            _ => {
                deduped.insert(name, obs.confidence);
            }
        }
    }
    deduped
}

/// Process-wide mapping from canonical tag name to tag identifier.
///
/// Constructed once at startup and shared by reference across every
/// concurrent ingestion task. Entries are only ever appended (or rewritten
/// with the same logical value); there is no eviction, no TTL, and no
/// persistence across restarts. The persistent store's unique name
/// constraint is the ultimate arbiter of name→id mapping.
#[derive(Clone, Default)]
pub struct TagCache {
    inner: Arc<RwLock<HashMap<String, i64>>>,
}

impl TagCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the identifier cached for a canonical name.
    pub async fn lookup(&self, name: &str) -> Option<i64> {
        self.inner.read().await.get(name).copied()
    }

    /// Record a resolved (name, id) pair. Idempotent: re-inserting the same
    /// pair is safe.
    pub async fn insert(&self, name: &str, id: i64) {
        self.inner.write().await.insert(name.to_string(), id);
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
