//! Image↔tag association repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use taggery_core::{Error, ImageTag, ImageTagRepository, Result};

/// PostgreSQL implementation of ImageTagRepository.
#[derive(Clone)]
pub struct PgImageTagRepository {
    pool: Pool<Postgres>,
}

impl PgImageTagRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List every association row for an image, automated and curated.
    ///
    /// Read helper for verification and tests; the pipeline only writes.
    pub async fn list_for_image(&self, image_id: i64) -> Result<Vec<ImageTag>> {
        let rows = sqlx::query(
            "SELECT image_id, tag_id, confidence, automated, created_at
             FROM image_tag
             WHERE image_id = $1
             ORDER BY tag_id",
        )
        .bind(image_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|r| ImageTag {
                image_id: r.get("image_id"),
                tag_id: r.get("tag_id"),
                confidence: r.get("confidence"),
                automated: r.get("automated"),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    /// Insert a human-curated association (used by fixtures and tests; the
    /// ingestion pipeline itself only writes automated rows).
    pub async fn insert_curated(
        &self,
        image_id: i64,
        tag_id: i64,
        confidence: f64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO image_tag (image_id, tag_id, confidence, automated)
             VALUES ($1, $2, $3, FALSE)
             ON CONFLICT (image_id, tag_id) DO NOTHING",
        )
        .bind(image_id)
        .bind(tag_id)
        .bind(confidence)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl ImageTagRepository for PgImageTagRepository {
    async fn clear_automated(&self, image_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM image_tag WHERE image_id = $1 AND automated")
            .bind(image_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn upsert_automated(&self, image_id: i64, entries: &[(i64, f64)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let tag_ids: Vec<i64> = entries.iter().map(|(id, _)| *id).collect();
        let confidences: Vec<f64> = entries.iter().map(|(_, c)| *c).collect();

        // Single atomic batch: unique on (image, tag), conflict overwrites
        // the confidence and keeps the row automated.
        sqlx::query(
            "INSERT INTO image_tag (image_id, tag_id, confidence, automated)
             SELECT $1, u.tag_id, u.confidence, TRUE
             FROM UNNEST($2::bigint[], $3::double precision[]) AS u(tag_id, confidence)
             ON CONFLICT (image_id, tag_id)
             DO UPDATE SET confidence = EXCLUDED.confidence, automated = TRUE",
        )
        .bind(image_id)
        .bind(&tag_ids)
        .bind(&confidences)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{seed_image, test_pool, unique_image_id, unique_suffix};
    use taggery_core::{ImageRepository, TagKind, TagRepository, TagTarget};

    async fn setup() -> (sqlx::PgPool, PgImageTagRepository) {
        let pool = test_pool().await;
        (pool.clone(), PgImageTagRepository::new(pool))
    }

    async fn seed_tags(pool: &sqlx::PgPool, suffix: &str, base: &[&str]) -> Vec<i64> {
        let tags = crate::tags::PgTagRepository::new(pool.clone());
        let names: Vec<String> = base.iter().map(|n| format!("{}-{}", n, suffix)).collect();
        tags.create_many(&names, TagKind::Label, TagTarget::ALL)
            .await
            .unwrap();
        let mut found = tags.find_by_names(&names).await.unwrap();
        found.sort_by_key(|t| t.id);
        found.into_iter().map(|t| t.id).collect()
    }

    #[tokio::test]
    async fn test_upsert_inserts_automated_rows() {
        let (pool, repo) = setup().await;
        let image_id = unique_image_id();
        seed_image(&pool, image_id).await;
        let tag_ids = seed_tags(&pool, &unique_suffix(), &["cat", "dog"]).await;

        repo.upsert_automated(image_id, &[(tag_ids[0], 0.9), (tag_ids[1], 0.5)])
            .await
            .unwrap();

        let rows = repo.list_for_image(image_id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.automated));

        crate::images::PgImageRepository::new(pool)
            .delete(image_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_and_overwrites_confidence() {
        let (pool, repo) = setup().await;
        let image_id = unique_image_id();
        seed_image(&pool, image_id).await;
        let tag_ids = seed_tags(&pool, &unique_suffix(), &["cat"]).await;

        repo.upsert_automated(image_id, &[(tag_ids[0], 0.4)])
            .await
            .unwrap();
        repo.upsert_automated(image_id, &[(tag_ids[0], 0.8)])
            .await
            .unwrap();

        let rows = repo.list_for_image(image_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].confidence, 0.8);
        assert!(rows[0].automated);

        crate::images::PgImageRepository::new(pool)
            .delete(image_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upsert_empty_batch_is_noop() {
        let (pool, repo) = setup().await;
        let image_id = unique_image_id();
        seed_image(&pool, image_id).await;

        repo.upsert_automated(image_id, &[]).await.unwrap();
        assert!(repo.list_for_image(image_id).await.unwrap().is_empty());

        crate::images::PgImageRepository::new(pool)
            .delete(image_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_clear_automated_preserves_curated_rows() {
        let (pool, repo) = setup().await;
        let image_id = unique_image_id();
        seed_image(&pool, image_id).await;
        let tag_ids = seed_tags(&pool, &unique_suffix(), &["cat", "dog"]).await;

        repo.insert_curated(image_id, tag_ids[0], 1.0).await.unwrap();
        repo.upsert_automated(image_id, &[(tag_ids[1], 0.7)])
            .await
            .unwrap();

        repo.clear_automated(image_id).await.unwrap();

        let rows = repo.list_for_image(image_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tag_id, tag_ids[0]);
        assert!(!rows[0].automated);

        crate::images::PgImageRepository::new(pool)
            .delete(image_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upsert_converts_curated_row_to_automated() {
        let (pool, repo) = setup().await;
        let image_id = unique_image_id();
        seed_image(&pool, image_id).await;
        let tag_ids = seed_tags(&pool, &unique_suffix(), &["cat"]).await;

        repo.insert_curated(image_id, tag_ids[0], 1.0).await.unwrap();
        repo.upsert_automated(image_id, &[(tag_ids[0], 0.6)])
            .await
            .unwrap();

        let rows = repo.list_for_image(image_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].automated);
        assert_eq!(rows[0].confidence, 0.6);

        crate::images::PgImageRepository::new(pool)
            .delete(image_id)
            .await
            .unwrap();
    }
}
