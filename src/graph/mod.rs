/*!
 * Permission Graph
 * Raw record shapes and the ingest-then-freeze graph store
 */

pub mod records;
pub mod store;

pub use records::{
    AssignmentRecord, GrantEntityRecord, MembershipRecord, PermissionGrant, PermissionRecord,
};
pub use store::{
    GrantEntity, GraphBuilder, GraphStats, IngestReport, IntegrityPolicy, PermissionGraph,
    Principal,
};
