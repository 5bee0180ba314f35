//! HTTP handler modules for taggery-api.

pub mod scans;
