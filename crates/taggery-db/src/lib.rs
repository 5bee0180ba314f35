//! # taggery-db
//!
//! PostgreSQL storage layer for taggery.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for images, tags, and associations
//!
//! ## Example
//!
//! ```rust,ignore
//! use taggery_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/taggery").await?;
//!     let exists = db.images.exists(42).await?;
//!     println!("image 42 present: {}", exists);
//!     Ok(())
//! }
//! ```

pub mod image_tags;
pub mod images;
pub mod pool;
pub mod tags;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use taggery_core::*;

// Re-export repository implementations
pub use image_tags::PgImageTagRepository;
pub use images::PgImageRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use tags::PgTagRepository;

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Image repository.
    pub images: PgImageRepository,
    /// Tag repository.
    pub tags: PgTagRepository,
    /// Image↔tag association repository.
    pub image_tags: PgImageTagRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            images: PgImageRepository::new(pool.clone()),
            tags: PgTagRepository::new(pool.clone()),
            image_tags: PgImageTagRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }
}
