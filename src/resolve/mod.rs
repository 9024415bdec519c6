/*!
 * Effective Permission Resolver
 * Merges every reachable grant into a per-principal, most-permissive view
 *
 * Flags are monotone booleans with no deny semantics: the effective value
 * of any flag is the OR across every permission record reachable from the
 * principal's direct and (active-group) indirect grant entities. The merge
 * is associative, commutative, and idempotent, so resolution never depends
 * on ingest order.
 */

use crate::core::errors::Result;
use crate::core::types::{
    EntityId, EntityKind, FieldFlags, PermissionPredicate, PrincipalId, ResourceFlags, SnapshotId,
};
use crate::graph::records::PermissionGrant;
use crate::hierarchy::Materializer;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Per-principal materialized view of every permission category.
///
/// Keyed by BTreeMaps so that serializing the same principal against the
/// same snapshot twice is byte-identical. Valid only for the snapshot it
/// names; a fresh snapshot means a fresh resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EffectivePermissionSet {
    pub principal_id: PrincipalId,
    pub snapshot_id: SnapshotId,
    pub resources: BTreeMap<String, ResourceFlags>,
    pub fields: BTreeMap<String, FieldFlags>,
    pub capabilities: BTreeMap<String, bool>,
    /// Grant entities the permissions came from, first-discovered order
    pub reachable: Vec<EntityId>,
    /// Cycles hit while expanding membership; non-empty means `partial`
    pub cycles: Vec<Vec<EntityId>>,
    pub partial: bool,
}

impl EffectivePermissionSet {
    /// Flags for a resource (all-false when the principal has no grant)
    pub fn resource(&self, resource: &str) -> ResourceFlags {
        self.resources.get(resource).copied().unwrap_or_default()
    }

    /// Flags for a field (all-false when the principal has no grant)
    pub fn field(&self, field: &str) -> FieldFlags {
        self.fields.get(field).copied().unwrap_or_default()
    }

    /// Whether a capability is enabled
    pub fn capability(&self, capability: &str) -> bool {
        self.capabilities.get(capability).copied().unwrap_or(false)
    }

    /// Evaluate a reverse-query predicate against this view
    pub fn satisfies(&self, predicate: &PermissionPredicate) -> bool {
        match predicate {
            PermissionPredicate::Resource { resource, access } => {
                self.resource(resource).has(*access)
            }
            PermissionPredicate::Field { field, access } => self.field(field).has(*access),
            PermissionPredicate::Capability { capability } => self.capability(capability),
        }
    }
}

/// Entity-level comparison of two principals' reachable grants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PermissionDiff {
    pub principal_a: PrincipalId,
    pub principal_b: PrincipalId,
    pub only_a: Vec<EntityId>,
    pub only_b: Vec<EntityId>,
    pub shared: Vec<EntityId>,
}

/// An entity as presented in an assignment breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AssignedEntity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub active: bool,
}

/// A directly-assigned group with its member bundles (structural view)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupAssignment {
    pub group: AssignedEntity,
    pub bundles: Vec<AssignedEntity>,
}

/// Direct vs. via-group breakdown of a principal's assignments, for
/// presentation collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AssignmentBreakdown {
    pub principal_id: PrincipalId,
    pub direct_bundles: Vec<AssignedEntity>,
    pub via_groups: Vec<GroupAssignment>,
    /// Unique bundles across direct and group-carried assignments
    pub total_unique_bundles: usize,
}

/// Read-only consumer of the frozen graph through the materializer
#[derive(Clone)]
pub struct Resolver {
    materializer: Arc<Materializer>,
}

impl Resolver {
    pub fn new(materializer: Arc<Materializer>) -> Self {
        Self { materializer }
    }

    /// Compute the merged effective permission set for one principal
    pub fn resolve(&self, principal_id: &str) -> Result<EffectivePermissionSet> {
        let graph = self.materializer.graph();
        graph.principal(principal_id)?;
        let closure = self.materializer.principal_closure(principal_id)?;

        let mut resources: BTreeMap<String, ResourceFlags> = BTreeMap::new();
        let mut fields: BTreeMap<String, FieldFlags> = BTreeMap::new();
        let mut capabilities: BTreeMap<String, bool> = BTreeMap::new();

        for entity_id in &closure.entities {
            for grant in graph.grants_of(entity_id) {
                match grant {
                    PermissionGrant::Resource { resource, flags } => {
                        resources.entry(resource.clone()).or_default().merge(*flags);
                    }
                    PermissionGrant::Field { field, flags } => {
                        fields.entry(field.clone()).or_default().merge(*flags);
                    }
                    PermissionGrant::Capability {
                        capability,
                        enabled,
                    } => {
                        *capabilities.entry(capability.clone()).or_insert(false) |= *enabled;
                    }
                }
            }
        }

        debug!(
            "resolved {principal_id}: {} resources, {} fields, {} capabilities from {} entities",
            resources.len(),
            fields.len(),
            capabilities.len(),
            closure.entities.len()
        );

        Ok(EffectivePermissionSet {
            principal_id: principal_id.to_string(),
            snapshot_id: graph.snapshot_id(),
            resources,
            fields,
            capabilities,
            reachable: closure.entities.clone(),
            cycles: closure.cycles.clone(),
            partial: closure.is_partial(),
        })
    }

    /// Compare the reachable grant-entity sets of two principals
    pub fn diff(&self, principal_a: &str, principal_b: &str) -> Result<PermissionDiff> {
        let a: BTreeSet<EntityId> = self
            .materializer
            .principal_closure(principal_a)?
            .entities
            .iter()
            .cloned()
            .collect();
        let b: BTreeSet<EntityId> = self
            .materializer
            .principal_closure(principal_b)?
            .entities
            .iter()
            .cloned()
            .collect();

        Ok(PermissionDiff {
            principal_a: principal_a.to_string(),
            principal_b: principal_b.to_string(),
            only_a: a.difference(&b).cloned().collect(),
            only_b: b.difference(&a).cloned().collect(),
            shared: a.intersection(&b).cloned().collect(),
        })
    }

    /// Split a principal's assignments into direct bundles and group-carried
    /// bundles. The group view is structural (inactive groups still listed,
    /// flagged by `active`), since auditors need to see what is assigned,
    /// not only what currently applies.
    pub fn assignment_breakdown(&self, principal_id: &str) -> Result<AssignmentBreakdown> {
        let graph = self.materializer.graph();
        let principal = graph.principal(principal_id)?;

        let mut direct_bundles = Vec::new();
        let mut via_groups = Vec::new();
        let mut unique: BTreeSet<EntityId> = BTreeSet::new();

        for entity_id in &principal.direct {
            let entity = graph.entity(entity_id)?;
            let assigned = AssignedEntity {
                id: entity.id.clone(),
                name: entity.name.clone(),
                kind: entity.kind,
                active: entity.active,
            };
            if entity.kind.is_group() {
                let mut bundles = Vec::new();
                for member_id in self.materializer.bundle_closure(entity_id)? {
                    let member = graph.entity(&member_id)?;
                    unique.insert(member.id.clone());
                    bundles.push(AssignedEntity {
                        id: member.id.clone(),
                        name: member.name.clone(),
                        kind: member.kind,
                        active: member.active,
                    });
                }
                via_groups.push(GroupAssignment {
                    group: assigned,
                    bundles,
                });
            } else {
                unique.insert(assigned.id.clone());
                direct_bundles.push(assigned);
            }
        }

        Ok(AssignmentBreakdown {
            principal_id: principal_id.to_string(),
            direct_bundles,
            via_groups,
            total_unique_bundles: unique.len(),
        })
    }
}
