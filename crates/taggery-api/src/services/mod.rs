//! Service layer for taggery-api.

pub mod scan_pipeline;

pub use scan_pipeline::{ScanOutcome, ScanPipeline};
