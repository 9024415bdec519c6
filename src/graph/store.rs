/*!
 * Permission Graph Store
 * Ingest raw records into a normalized, indexed, frozen in-memory graph
 */

use crate::core::errors::{EngineError, IntegrityError, Result};
use crate::core::types::{EntityId, EntityKind, PrincipalId, SnapshotId};
use crate::graph::records::{
    AssignmentRecord, GrantEntityRecord, MembershipRecord, PermissionGrant, PermissionRecord,
};
use ahash::RandomState;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, TimestampSeconds};
use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

/// What to do with rows that reference unknown identifiers at freeze time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityPolicy {
    /// Reject the whole snapshot on the first dangling reference
    Abort,
    /// Exclude offending rows, record every error in the ingest report
    SkipAndReport,
}

/// A grant-bearing entity in the frozen graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GrantEntity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub active: bool,
}

impl From<GrantEntityRecord> for GrantEntity {
    fn from(r: GrantEntityRecord) -> Self {
        Self {
            id: r.id,
            name: r.name,
            kind: r.kind,
            active: r.active,
        }
    }
}

/// A principal with its resolved direct-assignment set (insertion-ordered)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Principal {
    pub id: PrincipalId,
    pub direct: Vec<EntityId>,
}

/// Everything the freeze pass had to skip or tolerate.
///
/// A non-empty error list means the snapshot is partial: some source rows
/// could not be attached to the graph. The engine never drops them silently.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IngestReport {
    pub integrity_errors: Vec<IntegrityError>,
    pub duplicate_assignments: usize,
    pub duplicate_memberships: usize,
    pub duplicate_permissions: usize,
    #[serde_as(as = "TimestampSeconds<i64>")]
    pub frozen_at: SystemTime,
}

impl IngestReport {
    /// True when at least one source row was excluded from the graph
    pub fn is_partial(&self) -> bool {
        !self.integrity_errors.is_empty()
    }
}

/// Size counters for a frozen graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub principals: usize,
    pub bundles: usize,
    pub groups: usize,
    pub assignments: usize,
    pub membership_edges: usize,
    pub permission_records: usize,
}

/// Accumulates raw record batches before validation.
///
/// Batches may arrive in any order and across any number of pages; nothing
/// is validated until `freeze`, so a paginated ingest can interleave feeds.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    entities: Vec<GrantEntityRecord>,
    assignments: Vec<AssignmentRecord>,
    memberships: Vec<MembershipRecord>,
    permissions: Vec<PermissionRecord>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch of grant entity rows
    pub fn push_entities(&mut self, batch: impl IntoIterator<Item = GrantEntityRecord>) {
        self.entities.extend(batch);
    }

    /// Append a batch of principal assignment rows
    pub fn push_assignments(&mut self, batch: impl IntoIterator<Item = AssignmentRecord>) {
        self.assignments.extend(batch);
    }

    /// Append a batch of group membership rows
    pub fn push_memberships(&mut self, batch: impl IntoIterator<Item = MembershipRecord>) {
        self.memberships.extend(batch);
    }

    /// Append a batch of permission rows
    pub fn push_permissions(&mut self, batch: impl IntoIterator<Item = PermissionRecord>) {
        self.permissions.extend(batch);
    }

    /// Number of raw rows accumulated so far (all kinds)
    pub fn raw_len(&self) -> usize {
        self.entities.len() + self.assignments.len() + self.memberships.len()
            + self.permissions.len()
    }

    /// Validate every foreign reference and produce the frozen graph.
    ///
    /// With `IntegrityPolicy::Abort` any dangling reference rejects the
    /// snapshot, carrying the error count and the first offender. With
    /// `SkipAndReport` offending rows are excluded and every error lands in
    /// the graph's `IngestReport`.
    pub fn freeze(self, policy: IntegrityPolicy) -> Result<PermissionGraph> {
        let mut errors: Vec<IntegrityError> = Vec::new();

        // Entity map. Identical repeat rows are an idempotent re-ingest;
        // conflicting rows for one id are bad source data, first row wins.
        let mut entities: HashMap<EntityId, GrantEntity, RandomState> =
            HashMap::with_capacity_and_hasher(self.entities.len(), RandomState::new());
        for record in self.entities {
            if let Some(existing) = entities.get(&record.id) {
                let incoming: GrantEntity = record.into();
                if *existing != incoming {
                    errors.push(IntegrityError::DuplicateEntity {
                        entity_id: incoming.id,
                    });
                }
            } else {
                entities.insert(record.id.clone(), record.into());
            }
        }

        // Direct assignments, deduplicated, insertion order kept.
        let mut principals: HashMap<PrincipalId, Principal, RandomState> =
            HashMap::with_hasher(RandomState::new());
        let mut seen_assignments: HashSet<(PrincipalId, EntityId), RandomState> =
            HashSet::with_hasher(RandomState::new());
        let mut duplicate_assignments = 0;
        let mut assignment_count = 0;
        for record in self.assignments {
            if !entities.contains_key(&record.entity_id) {
                errors.push(IntegrityError::UnknownAssignmentTarget {
                    principal_id: record.principal_id,
                    entity_id: record.entity_id,
                });
                continue;
            }
            if !seen_assignments.insert((record.principal_id.clone(), record.entity_id.clone())) {
                duplicate_assignments += 1;
                continue;
            }
            assignment_count += 1;
            principals
                .entry(record.principal_id.clone())
                .or_insert_with(|| Principal {
                    id: record.principal_id,
                    direct: Vec::new(),
                })
                .direct
                .push(record.entity_id);
        }

        // Membership adjacency: group -> ordered member list.
        let mut members: HashMap<EntityId, Vec<EntityId>, RandomState> =
            HashMap::with_hasher(RandomState::new());
        let mut seen_memberships: HashSet<(EntityId, EntityId), RandomState> =
            HashSet::with_hasher(RandomState::new());
        let mut duplicate_memberships = 0;
        let mut membership_edges = 0;
        for record in self.memberships {
            match entities.get(&record.group_id) {
                None => {
                    errors.push(IntegrityError::UnknownMembershipGroup {
                        group_id: record.group_id,
                    });
                    continue;
                }
                Some(owner) if !owner.kind.is_group() => {
                    errors.push(IntegrityError::MembershipOnBundle {
                        entity_id: record.group_id,
                    });
                    continue;
                }
                Some(_) => {}
            }
            if !entities.contains_key(&record.member_id) {
                errors.push(IntegrityError::UnknownMembershipMember {
                    group_id: record.group_id,
                    member_id: record.member_id,
                });
                continue;
            }
            if !seen_memberships.insert((record.group_id.clone(), record.member_id.clone())) {
                duplicate_memberships += 1;
                continue;
            }
            membership_edges += 1;
            members
                .entry(record.group_id)
                .or_default()
                .push(record.member_id);
        }

        // Forward permission index: entity -> ordered grants. Exact duplicate
        // grants are dropped here; the resolver's OR-merge makes duplicates
        // harmless either way.
        let mut grants: HashMap<EntityId, Vec<PermissionGrant>, RandomState> =
            HashMap::with_hasher(RandomState::new());
        let mut duplicate_permissions = 0;
        let mut permission_records = 0;
        for record in self.permissions {
            if !entities.contains_key(&record.owner_id) {
                errors.push(IntegrityError::UnknownPermissionOwner {
                    entity_id: record.owner_id,
                });
                continue;
            }
            let owned = grants.entry(record.owner_id).or_default();
            if owned.contains(&record.grant) {
                duplicate_permissions += 1;
                continue;
            }
            permission_records += 1;
            owned.push(record.grant);
        }

        if policy == IntegrityPolicy::Abort {
            if let Some(first) = errors.first() {
                return Err(EngineError::IntegrityReport {
                    count: errors.len(),
                    first: first.clone(),
                });
            }
        }
        for error in &errors {
            warn!("skipped row during freeze: {error}");
        }

        let stats = GraphStats {
            principals: principals.len(),
            bundles: entities.values().filter(|e| !e.kind.is_group()).count(),
            groups: entities.values().filter(|e| e.kind.is_group()).count(),
            assignments: assignment_count,
            membership_edges,
            permission_records,
        };
        let report = IngestReport {
            integrity_errors: errors,
            duplicate_assignments,
            duplicate_memberships,
            duplicate_permissions,
            frozen_at: SystemTime::now(),
        };
        let snapshot_id = uuid::Uuid::new_v4();
        debug!(
            "froze snapshot {snapshot_id}: {} principals, {} entities, {} permission records",
            stats.principals,
            stats.bundles + stats.groups,
            stats.permission_records
        );

        Ok(PermissionGraph {
            snapshot_id,
            entities,
            principals,
            members,
            grants,
            stats,
            report,
        })
    }
}

/// Frozen, read-only permission graph for one analysis run.
///
/// Built once per snapshot; no mutation API exists after freeze, so the
/// graph (behind an `Arc`) is safe for unbounded concurrent readers.
#[derive(Debug)]
pub struct PermissionGraph {
    snapshot_id: SnapshotId,
    entities: HashMap<EntityId, GrantEntity, RandomState>,
    principals: HashMap<PrincipalId, Principal, RandomState>,
    members: HashMap<EntityId, Vec<EntityId>, RandomState>,
    grants: HashMap<EntityId, Vec<PermissionGrant>, RandomState>,
    stats: GraphStats,
    report: IngestReport,
}

impl PermissionGraph {
    /// Snapshot identity, carried by every derived view
    pub fn snapshot_id(&self) -> SnapshotId {
        self.snapshot_id
    }

    /// O(1) entity lookup
    pub fn entity(&self, id: &str) -> Result<&GrantEntity> {
        self.entities
            .get(id)
            .ok_or_else(|| EngineError::EntityNotFound(id.to_string()))
    }

    /// O(1) principal lookup
    pub fn principal(&self, id: &str) -> Result<&Principal> {
        self.principals
            .get(id)
            .ok_or_else(|| EngineError::PrincipalNotFound(id.to_string()))
    }

    /// All grants owned by an entity (empty for unknown ids)
    pub fn grants_of(&self, id: &str) -> &[PermissionGrant] {
        self.grants.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ordered member list of a group (empty for bundles and unknown ids)
    pub fn members_of(&self, id: &str) -> &[EntityId] {
        self.members.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_entity(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// Iterate all entities (unordered)
    pub fn entities(&self) -> impl Iterator<Item = &GrantEntity> {
        self.entities.values()
    }

    /// Iterate all principals (unordered)
    pub fn principals(&self) -> impl Iterator<Item = &Principal> {
        self.principals.values()
    }

    pub fn stats(&self) -> GraphStats {
        self.stats
    }

    pub fn report(&self) -> &IngestReport {
        &self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ResourceFlags;

    fn sample_builder() -> GraphBuilder {
        let mut b = GraphBuilder::new();
        b.push_entities([
            GrantEntityRecord::bundle("B1", "Sales Access"),
            GrantEntityRecord::group("G1", "Sales Team", true),
        ]);
        b.push_memberships([MembershipRecord {
            group_id: "G1".into(),
            member_id: "B1".into(),
        }]);
        b.push_assignments([AssignmentRecord {
            principal_id: "U1".into(),
            entity_id: "G1".into(),
        }]);
        b.push_permissions([PermissionRecord::new(
            "B1",
            PermissionGrant::resource(
                "Account",
                ResourceFlags {
                    read: true,
                    ..Default::default()
                },
            ),
        )]);
        b
    }

    #[test]
    fn test_freeze_clean_snapshot() {
        let graph = sample_builder().freeze(IntegrityPolicy::Abort).unwrap();
        assert!(!graph.report().is_partial());
        assert_eq!(graph.stats().principals, 1);
        assert_eq!(graph.stats().bundles, 1);
        assert_eq!(graph.stats().groups, 1);
        assert_eq!(graph.members_of("G1"), ["B1"]);
        assert_eq!(graph.grants_of("B1").len(), 1);
    }

    #[test]
    fn test_lookup_errors() {
        let graph = sample_builder().freeze(IntegrityPolicy::Abort).unwrap();
        assert!(matches!(
            graph.principal("nobody"),
            Err(EngineError::PrincipalNotFound(_))
        ));
        assert!(matches!(
            graph.entity("PS_Missing"),
            Err(EngineError::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_dangling_permission_owner_aborts() {
        let mut b = sample_builder();
        b.push_permissions([PermissionRecord::new(
            "PS_Ghost",
            PermissionGrant::capability("X", true),
        )]);
        let err = b.freeze(IntegrityPolicy::Abort).unwrap_err();
        match err {
            EngineError::IntegrityReport { count, first } => {
                assert_eq!(count, 1);
                assert_eq!(first.offending_id(), "PS_Ghost");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_skip_and_report_marks_partial() {
        let mut b = sample_builder();
        b.push_assignments([AssignmentRecord {
            principal_id: "U2".into(),
            entity_id: "PS_Gone".into(),
        }]);
        let graph = b.freeze(IntegrityPolicy::SkipAndReport).unwrap();
        assert!(graph.report().is_partial());
        assert_eq!(graph.report().integrity_errors.len(), 1);
        // U2's only assignment dangled, so U2 never materialized
        assert!(graph.principal("U2").is_err());
    }

    #[test]
    fn test_duplicate_rows_are_deduplicated() {
        let mut b = sample_builder();
        b.push_assignments([AssignmentRecord {
            principal_id: "U1".into(),
            entity_id: "G1".into(),
        }]);
        b.push_memberships([MembershipRecord {
            group_id: "G1".into(),
            member_id: "B1".into(),
        }]);
        b.push_permissions([PermissionRecord::new(
            "B1",
            PermissionGrant::resource(
                "Account",
                ResourceFlags {
                    read: true,
                    ..Default::default()
                },
            ),
        )]);
        // Identical entity rows re-ingested are harmless
        b.push_entities([GrantEntityRecord::bundle("B1", "Sales Access")]);

        let graph = b.freeze(IntegrityPolicy::Abort).unwrap();
        assert_eq!(graph.report().duplicate_assignments, 1);
        assert_eq!(graph.report().duplicate_memberships, 1);
        assert_eq!(graph.report().duplicate_permissions, 1);
        assert_eq!(graph.principal("U1").unwrap().direct, ["G1"]);
        assert_eq!(graph.grants_of("B1").len(), 1);
    }

    #[test]
    fn test_conflicting_entity_rows_error() {
        let mut b = sample_builder();
        b.push_entities([GrantEntityRecord::bundle("B1", "Renamed Access")]);
        let err = b.freeze(IntegrityPolicy::Abort).unwrap_err();
        assert!(matches!(err, EngineError::IntegrityReport { .. }));
    }

    #[test]
    fn test_membership_on_bundle_rejected() {
        let mut b = sample_builder();
        b.push_memberships([MembershipRecord {
            group_id: "B1".into(),
            member_id: "G1".into(),
        }]);
        let graph = b.freeze(IntegrityPolicy::SkipAndReport).unwrap();
        assert!(graph
            .report()
            .integrity_errors
            .iter()
            .any(|e| matches!(e, IntegrityError::MembershipOnBundle { .. })));
        assert!(graph.members_of("B1").is_empty());
    }
}
