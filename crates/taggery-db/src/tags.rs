//! Tag repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};

use taggery_core::{Error, Result, Tag, TagKind, TagRef, TagRepository, TagTarget};

/// PostgreSQL implementation of TagRepository.
#[derive(Clone)]
pub struct PgTagRepository {
    pool: Pool<Postgres>,
}

impl PgTagRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Fetch a full tag definition by canonical name.
    pub async fn get(&self, name: &str) -> Result<Option<Tag>> {
        let row = sqlx::query(
            "SELECT id, name, kind, targets, created_at FROM tag WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(|r| {
            let kind: String = r.get("kind");
            let targets: Vec<String> = r.get("targets");
            Ok(Tag {
                id: r.get("id"),
                name: r.get("name"),
                kind: kind
                    .parse()
                    .map_err(|e: String| Error::Serialization(e))?,
                targets: targets.iter().filter_map(|t| t.parse().ok()).collect(),
                created_at: r.get("created_at"),
            })
        })
        .transpose()
    }
}

#[async_trait]
impl TagRepository for PgTagRepository {
    async fn find_by_names(&self, names: &[String]) -> Result<Vec<TagRef>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query("SELECT id, name FROM tag WHERE name = ANY($1)")
            .bind(names)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| TagRef {
                id: r.get("id"),
                name: r.get("name"),
            })
            .collect())
    }

    async fn create_many(
        &self,
        names: &[String],
        kind: TagKind,
        targets: &[TagTarget],
    ) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let now = Utc::now();
        let targets: Vec<String> = targets.iter().map(|t| t.to_string()).collect();

        // One batched insert; a name that already exists (possibly created
        // by a racing request) hits the unique index and is skipped.
        sqlx::query(
            "INSERT INTO tag (name, kind, targets, created_at)
             SELECT u.name, $2, $3, $4
             FROM UNNEST($1::text[]) AS u(name)
             ON CONFLICT (name) DO NOTHING",
        )
        .bind(names)
        .bind(kind.as_str())
        .bind(&targets)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{test_pool, unique_suffix};

    async fn setup() -> PgTagRepository {
        PgTagRepository::new(test_pool().await)
    }

    fn names(suffix: &str, base: &[&str]) -> Vec<String> {
        base.iter().map(|n| format!("{}-{}", n, suffix)).collect()
    }

    #[tokio::test]
    async fn test_create_many_and_find_by_names() {
        let repo = setup().await;
        let suffix = unique_suffix();
        let batch = names(&suffix, &["cat", "dog"]);

        repo.create_many(&batch, TagKind::Label, TagTarget::ALL)
            .await
            .unwrap();

        let found = repo.find_by_names(&batch).await.unwrap();
        assert_eq!(found.len(), 2);
        let mut found_names: Vec<&str> = found.iter().map(|t| t.name.as_str()).collect();
        found_names.sort();
        assert_eq!(found_names, vec![batch[0].as_str(), batch[1].as_str()]);
    }

    #[tokio::test]
    async fn test_create_many_skips_existing_names() {
        let repo = setup().await;
        let suffix = unique_suffix();
        let batch = names(&suffix, &["cat"]);

        repo.create_many(&batch, TagKind::Label, TagTarget::ALL)
            .await
            .unwrap();
        let first = repo.find_by_names(&batch).await.unwrap();

        // Second creation of the same name must neither fail nor produce a
        // second row, and the assigned id must be stable.
        repo.create_many(&batch, TagKind::Label, TagTarget::ALL)
            .await
            .unwrap();
        let second = repo.find_by_names(&batch).await.unwrap();

        assert_eq!(second.len(), 1);
        assert_eq!(first[0].id, second[0].id);
    }

    #[tokio::test]
    async fn test_find_by_names_missing_names_absent() {
        let repo = setup().await;
        let suffix = unique_suffix();
        let batch = names(&suffix, &["cat", "never-created"]);

        repo.create_many(&batch[..1], TagKind::Label, TagTarget::ALL)
            .await
            .unwrap();

        let found = repo.find_by_names(&batch).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, batch[0]);
    }

    #[tokio::test]
    async fn test_find_by_names_empty_input() {
        let repo = setup().await;
        assert!(repo.find_by_names(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_returns_kind_and_targets() {
        let repo = setup().await;
        let suffix = unique_suffix();
        let name = format!("rating-{}", suffix);

        repo.create_many(
            &[name.clone()],
            TagKind::Moderation,
            &[TagTarget::Image, TagTarget::Post],
        )
        .await
        .unwrap();

        let tag = repo.get(&name).await.unwrap().expect("tag should exist");
        assert_eq!(tag.name, name);
        assert_eq!(tag.kind, TagKind::Moderation);
        assert_eq!(tag.targets, vec![TagTarget::Image, TagTarget::Post]);
    }

    #[tokio::test]
    async fn test_get_missing_tag() {
        let repo = setup().await;
        let name = format!("missing-{}", unique_suffix());
        assert!(repo.get(&name).await.unwrap().is_none());
    }
}
