/*!
 * Permscope
 * Permission resolution and auditing over a frozen directory snapshot
 *
 * Models a layered access-control system — individual bundles, grouped
 * grants, and per-resource permission records — and answers two questions:
 * "what can principal P do?" (effective resolution) and "who can do X?"
 * (reverse lookup for audits).
 *
 * ## Usage
 * ```ignore
 * use permscope::{GraphBuilder, IntegrityPolicy, PermissionEngine,
 *                 PermissionPredicate, ResourceAccess};
 *
 * let mut builder = GraphBuilder::new();
 * // ... push record batches fetched from the directory service ...
 * let engine = PermissionEngine::from_graph(
 *     builder.freeze(IntegrityPolicy::SkipAndReport)?,
 * );
 *
 * let effective = engine.resolve("U1")?;
 * if effective.resource("Account").delete {
 *     // ...
 * }
 *
 * let who = engine.principals(&PermissionPredicate::resource(
 *     "Account",
 *     ResourceAccess::Delete,
 * ));
 * ```
 */

pub mod core;
pub mod engine;
pub mod graph;
pub mod hierarchy;
pub mod ingest;
pub mod query;
pub mod resolve;

// Re-exports
pub use crate::core::errors::{EngineError, IntegrityError, Result};
pub use crate::core::types::{
    EntityId, EntityKind, FieldAccess, FieldFlags, PermissionPredicate, PrincipalId,
    ResourceAccess, ResourceFlags, SnapshotId,
};
pub use crate::engine::PermissionEngine;
pub use crate::graph::{
    AssignmentRecord, GrantEntity, GrantEntityRecord, GraphBuilder, GraphStats, IngestReport,
    IntegrityPolicy, MembershipRecord, PermissionGraph, PermissionGrant, PermissionRecord,
    Principal,
};
pub use crate::hierarchy::{Closure, HierarchyNode, Materializer};
pub use crate::ingest::{CancelToken, IngestConfig, Ingestor, Page, RecordSource};
pub use crate::query::{IdSet, ReverseIndex};
pub use crate::resolve::{
    AssignedEntity, AssignmentBreakdown, EffectivePermissionSet, GroupAssignment, PermissionDiff,
    Resolver,
};
