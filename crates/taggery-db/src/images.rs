//! Image repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use taggery_core::{Error, Image, ImageRepository, Result, TagKind};

/// PostgreSQL implementation of ImageRepository.
#[derive(Clone)]
pub struct PgImageRepository {
    pool: Pool<Postgres>,
}

impl PgImageRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Fetch an image record by id.
    ///
    /// Read helper for verification and tests; the pipeline itself never
    /// reads images back.
    pub async fn get(&self, id: i64) -> Result<Option<Image>> {
        let row = sqlx::query("SELECT id, scanned_at, nsfw, created_at FROM image WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|r| Image {
            id: r.get("id"),
            scanned_at: r.get("scanned_at"),
            nsfw: r.get("nsfw"),
            created_at: r.get("created_at"),
        }))
    }
}

#[async_trait]
impl ImageRepository for PgImageRepository {
    async fn delete(&self, id: i64) -> Result<()> {
        // Absence is not an error: the desired end state (image gone)
        // already holds.
        sqlx::query("DELETE FROM image WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn exists(&self, id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM image WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(exists)
    }

    async fn mark_scanned(&self, id: i64) -> Result<()> {
        // One statement: stamp the scan time and derive the NSFW flag from
        // the automated moderation-kind associations currently on the image.
        let result = sqlx::query(
            "UPDATE image
             SET scanned_at = now(),
                 nsfw = EXISTS (
                     SELECT 1
                     FROM image_tag it
                     JOIN tag t ON t.id = it.tag_id
                     WHERE it.image_id = image.id
                       AND it.automated
                       AND t.kind = $2
                 )
             WHERE id = $1",
        )
        .bind(id)
        .bind(TagKind::Moderation.as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ImageNotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{seed_image, test_pool, unique_image_id};
    use taggery_core::{ImageTagRepository, TagRepository, TagTarget};

    async fn setup() -> (Pool<Postgres>, PgImageRepository) {
        let pool = test_pool().await;
        (pool.clone(), PgImageRepository::new(pool))
    }

    #[tokio::test]
    async fn test_exists_and_delete() {
        let (pool, repo) = setup().await;
        let id = unique_image_id();
        seed_image(&pool, id).await;

        assert!(repo.exists(id).await.unwrap());
        repo.delete(id).await.unwrap();
        assert!(!repo.exists(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_absent_image_is_ok() {
        let (_, repo) = setup().await;
        // Never seeded; delete must still succeed.
        repo.delete(unique_image_id()).await.unwrap();
    }

    #[tokio::test]
    async fn test_mark_scanned_missing_image() {
        let (_, repo) = setup().await;
        let err = repo.mark_scanned(unique_image_id()).await.unwrap_err();
        match err {
            Error::ImageNotFound(_) => {}
            other => panic!("Expected ImageNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_mark_scanned_stamps_and_stays_safe_without_moderation_tags() {
        let (pool, repo) = setup().await;
        let id = unique_image_id();
        seed_image(&pool, id).await;

        repo.mark_scanned(id).await.unwrap();

        let image = repo.get(id).await.unwrap().unwrap();
        assert!(image.scanned_at.is_some());
        assert!(!image.nsfw);

        repo.delete(id).await.unwrap();
        assert!(repo.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_scanned_derives_nsfw_from_moderation_tag() {
        let (pool, repo) = setup().await;
        let tags = crate::tags::PgTagRepository::new(pool.clone());
        let associations = crate::image_tags::PgImageTagRepository::new(pool.clone());

        let id = unique_image_id();
        seed_image(&pool, id).await;

        let name = format!("explicit-{}", id);
        tags.create_many(
            &[name.clone()],
            TagKind::Moderation,
            &[TagTarget::Image],
        )
        .await
        .unwrap();
        let tag = tags.find_by_names(&[name]).await.unwrap().remove(0);

        associations
            .upsert_automated(id, &[(tag.id, 0.99)])
            .await
            .unwrap();
        repo.mark_scanned(id).await.unwrap();
        assert!(repo.get(id).await.unwrap().unwrap().nsfw);

        // Clearing the automated rows and re-marking flips it back.
        associations.clear_automated(id).await.unwrap();
        repo.mark_scanned(id).await.unwrap();
        assert!(!repo.get(id).await.unwrap().unwrap().nsfw);

        repo.delete(id).await.unwrap();
    }
}
