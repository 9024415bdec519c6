/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::types::{EntityId, PrincipalId};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A dangling foreign reference found while freezing a snapshot.
///
/// The store only reports these; whether they abort the freeze or are
/// skipped (and surfaced in the ingest report) is the caller's policy.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum IntegrityError {
    #[error("permission record references unknown grant entity '{entity_id}'")]
    #[diagnostic(
        code(graph::unknown_permission_owner),
        help("Every permission record must belong to an ingested grant entity. Check the snapshot for missing entity rows.")
    )]
    UnknownPermissionOwner { entity_id: EntityId },

    #[error("assignment for principal '{principal_id}' references unknown grant entity '{entity_id}'")]
    #[diagnostic(
        code(graph::unknown_assignment_target),
        help("The assigned bundle or group was not present in the snapshot. The assignment cannot contribute permissions.")
    )]
    UnknownAssignmentTarget {
        principal_id: PrincipalId,
        entity_id: EntityId,
    },

    #[error("membership references unknown group '{group_id}'")]
    #[diagnostic(
        code(graph::unknown_membership_group),
        help("A membership edge points at a group that was not ingested.")
    )]
    UnknownMembershipGroup { group_id: EntityId },

    #[error("membership for group '{group_id}' references unknown member '{member_id}'")]
    #[diagnostic(
        code(graph::unknown_membership_member),
        help("A membership edge points at a member entity that was not ingested.")
    )]
    UnknownMembershipMember {
        group_id: EntityId,
        member_id: EntityId,
    },

    #[error("membership owner '{entity_id}' is not a group")]
    #[diagnostic(
        code(graph::membership_on_bundle),
        help("Only groups own members. A bundle appearing on the owning side of a membership edge is bad source data.")
    )]
    MembershipOnBundle { entity_id: EntityId },

    #[error("duplicate grant entity row for '{entity_id}'")]
    #[diagnostic(
        code(graph::duplicate_entity),
        help("The snapshot contained more than one row for this entity id. The first row wins.")
    )]
    DuplicateEntity { entity_id: EntityId },
}

impl IntegrityError {
    /// The id the auditor needs to fix in the source data
    pub fn offending_id(&self) -> &str {
        match self {
            IntegrityError::UnknownPermissionOwner { entity_id } => entity_id,
            IntegrityError::UnknownAssignmentTarget { entity_id, .. } => entity_id,
            IntegrityError::UnknownMembershipGroup { group_id } => group_id,
            IntegrityError::UnknownMembershipMember { member_id, .. } => member_id,
            IntegrityError::MembershipOnBundle { entity_id } => entity_id,
            IntegrityError::DuplicateEntity { entity_id } => entity_id,
        }
    }
}

/// Unified engine error type with miette diagnostics
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum EngineError {
    #[error("data integrity error: {0}")]
    #[diagnostic(transparent)]
    Integrity(#[from] IntegrityError),

    #[error("snapshot rejected: {count} integrity error(s), first: {first}")]
    #[diagnostic(
        code(graph::integrity_report),
        help("Freeze was run with the abort policy. Fix the source data or freeze with IntegrityPolicy::SkipAndReport.")
    )]
    IntegrityReport {
        count: usize,
        first: IntegrityError,
    },

    #[error("membership cycle through {}", members.join(" -> "))]
    #[diagnostic(
        code(hierarchy::cycle),
        help("A group reaches itself transitively. Expansion stops at the cycle point and affected closures are partial.")
    )]
    HierarchyCycle { members: Vec<EntityId> },

    #[error("principal '{0}' not found in this snapshot")]
    #[diagnostic(
        code(engine::principal_not_found),
        help("The principal was not present in the ingested assignment records.")
    )]
    PrincipalNotFound(PrincipalId),

    #[error("grant entity '{0}' not found in this snapshot")]
    #[diagnostic(
        code(engine::entity_not_found),
        help("The bundle or group id is unknown to the frozen graph.")
    )]
    EntityNotFound(EntityId),

    #[error("ingest cancelled before the snapshot was frozen")]
    #[diagnostic(
        code(ingest::cancelled),
        help("Partial ingest state was discarded. Re-run the ingest to build a snapshot.")
    )]
    IngestCancelled,

    #[error("record source error: {message}")]
    #[diagnostic(
        code(ingest::source),
        help("The external query collaborator failed. Retries and timeouts are its policy, not the engine's.")
    )]
    Source { message: String },
}

impl EngineError {
    /// Wrap an external source failure
    pub fn source(message: impl Into<String>) -> Self {
        EngineError::Source {
            message: message.into(),
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
