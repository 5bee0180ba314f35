//! # taggery-core
//!
//! Core types, traits, and abstractions for the taggery ingestion service.
//!
//! This crate provides the data structures, the persistent-store contract,
//! and the pure tag logic (normalization, deduplication, shared cache) that
//! the storage and API crates depend on.

pub mod error;
pub mod logging;
pub mod models;
pub mod tags;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use tags::{dedupe_observations, normalize_tag_name, TagCache};
pub use traits::*;
