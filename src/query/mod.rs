/*!
 * Reverse Query Engine
 * Answers "who can do X?" without resolving every principal
 *
 * Built once per frozen graph: a (key, flag) -> holding-entities index plus
 * an inverted membership index (entity -> principals that reach it). A
 * lookup is then O(matching entities) with a bounded expansion to
 * principals, instead of O(principals x permissions).
 */

use crate::core::types::{
    EntityId, FieldAccess, PermissionPredicate, PrincipalId, ResourceAccess, SnapshotId,
};
use crate::graph::records::PermissionGrant;
use crate::hierarchy::Materializer;
use ahash::RandomState;
use log::debug;
use std::collections::{HashMap, HashSet};

/// Unordered id set; callers needing deterministic output sort by id
pub type IdSet = HashSet<String, RandomState>;

const RESOURCE_ACCESSES: [ResourceAccess; 6] = [
    ResourceAccess::Create,
    ResourceAccess::Read,
    ResourceAccess::Edit,
    ResourceAccess::Delete,
    ResourceAccess::ViewAll,
    ResourceAccess::ModifyAll,
];

/// Reverse indices over one frozen snapshot
pub struct ReverseIndex {
    snapshot_id: SnapshotId,
    resources: HashMap<(String, ResourceAccess), IdSet, RandomState>,
    fields: HashMap<(String, FieldAccess), IdSet, RandomState>,
    capabilities: HashMap<String, IdSet, RandomState>,
    /// entity -> principals that reach it via direct assignment or
    /// active-group closure (exactly the resolution rule)
    principals_by_entity: HashMap<EntityId, HashSet<PrincipalId, RandomState>, RandomState>,
}

impl ReverseIndex {
    /// Index every permission record and invert the materializer's
    /// principal closures. One pass per snapshot, then read-only.
    pub fn build(materializer: &Materializer) -> Self {
        let graph = materializer.graph();

        let mut resources: HashMap<(String, ResourceAccess), IdSet, RandomState> =
            HashMap::with_hasher(RandomState::new());
        let mut fields: HashMap<(String, FieldAccess), IdSet, RandomState> =
            HashMap::with_hasher(RandomState::new());
        let mut capabilities: HashMap<String, IdSet, RandomState> =
            HashMap::with_hasher(RandomState::new());

        for entity in graph.entities() {
            for grant in graph.grants_of(&entity.id) {
                match grant {
                    PermissionGrant::Resource { resource, flags } => {
                        for access in RESOURCE_ACCESSES {
                            if flags.has(access) {
                                resources
                                    .entry((resource.clone(), access))
                                    .or_insert_with(|| IdSet::with_hasher(RandomState::new()))
                                    .insert(entity.id.clone());
                            }
                        }
                    }
                    PermissionGrant::Field { field, flags } => {
                        for access in [FieldAccess::Read, FieldAccess::Edit] {
                            if flags.has(access) {
                                fields
                                    .entry((field.clone(), access))
                                    .or_insert_with(|| IdSet::with_hasher(RandomState::new()))
                                    .insert(entity.id.clone());
                            }
                        }
                    }
                    PermissionGrant::Capability {
                        capability,
                        enabled,
                    } => {
                        if *enabled {
                            capabilities
                                .entry(capability.clone())
                                .or_insert_with(|| IdSet::with_hasher(RandomState::new()))
                                .insert(entity.id.clone());
                        }
                    }
                }
            }
        }

        let mut principals_by_entity: HashMap<
            EntityId,
            HashSet<PrincipalId, RandomState>,
            RandomState,
        > = HashMap::with_hasher(RandomState::new());
        for principal in graph.principals() {
            // Every principal in the frozen graph has a valid closure
            if let Ok(closure) = materializer.principal_closure(&principal.id) {
                for entity_id in &closure.entities {
                    principals_by_entity
                        .entry(entity_id.clone())
                        .or_insert_with(|| HashSet::with_hasher(RandomState::new()))
                        .insert(principal.id.clone());
                }
            }
        }

        debug!(
            "reverse index built: {} resource keys, {} field keys, {} capabilities, {} reached entities",
            resources.len(),
            fields.len(),
            capabilities.len(),
            principals_by_entity.len()
        );

        Self {
            snapshot_id: graph.snapshot_id(),
            resources,
            fields,
            capabilities,
            principals_by_entity,
        }
    }

    pub fn snapshot_id(&self) -> SnapshotId {
        self.snapshot_id
    }

    /// Every entity directly holding the flag, regardless of active status.
    /// Auditors need inactive-but-assigned grants too; activity filtering
    /// is a presentation concern.
    pub fn granting_entities(&self, predicate: &PermissionPredicate) -> IdSet {
        let found = match predicate {
            PermissionPredicate::Resource { resource, access } => {
                self.resources.get(&(resource.clone(), *access))
            }
            PermissionPredicate::Field { field, access } => {
                self.fields.get(&(field.clone(), *access))
            }
            PermissionPredicate::Capability { capability } => self.capabilities.get(capability),
        };
        found
            .cloned()
            .unwrap_or_else(|| IdSet::with_hasher(RandomState::new()))
    }

    /// Every principal whose resolved permissions satisfy the predicate:
    /// the granting entities expanded through the inverted membership
    /// index, de-duplicated across paths.
    pub fn principals(&self, predicate: &PermissionPredicate) -> IdSet {
        let mut out = IdSet::with_hasher(RandomState::new());
        for entity_id in self.granting_entities(predicate) {
            if let Some(reaching) = self.principals_by_entity.get(&entity_id) {
                out.extend(reaching.iter().cloned());
            }
        }
        out
    }

    /// How many principals reach an entity (audit weight)
    pub fn assignment_count(&self, entity_id: &str) -> usize {
        self.principals_by_entity
            .get(entity_id)
            .map(HashSet::len)
            .unwrap_or(0)
    }
}
