//! Structured logging field name constants for taggery.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across a request's sub-calls.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "pipeline"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "scan_pipeline", "resolver", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "process", "resolve", "purge", "upsert"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Image identifier being operated on.
pub const IMAGE_ID: &str = "image_id";

/// Tag identifier.
pub const TAG_ID: &str = "tag_id";

/// Canonical tag name.
pub const TAG_NAME: &str = "tag_name";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of tags involved in an operation.
pub const TAG_COUNT: &str = "tag_count";

/// Number of cache hits during resolution.
pub const CACHE_HITS: &str = "cache_hits";

/// Number of tags created during resolution.
pub const CREATED_COUNT: &str = "created_count";

/// Number of names dropped as unresolvable.
pub const DROPPED_COUNT: &str = "dropped_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
