/*!
 * Engine Limits and Constants
 *
 * Centralized location for the engine's bounds and thresholds.
 */

// =============================================================================
// INGEST LIMITS
// =============================================================================

/// Default cap on concurrently in-flight page requests
/// The external directory service is paginated and rate-limited; four feeds
/// with a small in-flight budget keeps us pipelined without hammering it
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

/// Hard cap on pages consumed per record feed
/// A runaway or looping cursor must not ingest forever
pub const MAX_PAGES_PER_FEED: usize = 10_000;

/// Largest page the builder will accept in one call
/// Anything bigger indicates a misbehaving source
pub const MAX_RECORDS_PER_PAGE: usize = 50_000;

// =============================================================================
// HIERARCHY LIMITS
// =============================================================================

/// Maximum closure depth before expansion is treated as runaway
/// Cycles are caught by the in-progress marker; this bounds pathological
/// (but acyclic) nesting depth from bad source data
pub const MAX_CLOSURE_DEPTH: usize = 1_000;
