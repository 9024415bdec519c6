/*!
 * Permission Engine
 * Central facade over one frozen snapshot
 *
 * Owns the graph, its materializer, and a lazily-built reverse index.
 * Everything behind it is immutable, so the engine is `Clone` (shared
 * innards) and safe for unbounded concurrent readers with no locking on
 * the read path.
 */

use crate::core::errors::Result;
use crate::core::types::{EntityId, PermissionPredicate, SnapshotId};
use crate::graph::store::{GraphStats, IngestReport, PermissionGraph};
use crate::hierarchy::{Closure, HierarchyNode, Materializer};
use crate::query::{IdSet, ReverseIndex};
use crate::resolve::{
    AssignmentBreakdown, EffectivePermissionSet, PermissionDiff, Resolver,
};
use log::debug;
use std::sync::{Arc, OnceLock};

/// Read-only query surface over one frozen permission graph
#[derive(Clone)]
pub struct PermissionEngine {
    graph: Arc<PermissionGraph>,
    materializer: Arc<Materializer>,
    resolver: Resolver,
    reverse: Arc<OnceLock<Arc<ReverseIndex>>>,
}

impl PermissionEngine {
    pub fn new(graph: Arc<PermissionGraph>) -> Self {
        debug!("engine over snapshot {}", graph.snapshot_id());
        let materializer = Arc::new(Materializer::new(graph.clone()));
        let resolver = Resolver::new(materializer.clone());
        Self {
            graph,
            materializer,
            resolver,
            reverse: Arc::new(OnceLock::new()),
        }
    }

    pub fn from_graph(graph: PermissionGraph) -> Self {
        Self::new(Arc::new(graph))
    }

    pub fn snapshot_id(&self) -> SnapshotId {
        self.graph.snapshot_id()
    }

    pub fn stats(&self) -> GraphStats {
        self.graph.stats()
    }

    /// What the freeze pass skipped or tolerated; partial means the
    /// snapshot excludes some source rows
    pub fn report(&self) -> &IngestReport {
        self.graph.report()
    }

    pub fn graph(&self) -> &Arc<PermissionGraph> {
        &self.graph
    }

    /// What can this principal do?
    pub fn resolve(&self, principal_id: &str) -> Result<EffectivePermissionSet> {
        self.resolver.resolve(principal_id)
    }

    /// Entity-level comparison of two principals
    pub fn diff(&self, principal_a: &str, principal_b: &str) -> Result<PermissionDiff> {
        self.resolver.diff(principal_a, principal_b)
    }

    /// Direct vs. via-group assignment view for presentation
    pub fn assignment_breakdown(&self, principal_id: &str) -> Result<AssignmentBreakdown> {
        self.resolver.assignment_breakdown(principal_id)
    }

    /// Which entities directly hold this flag? (audit view, active or not)
    pub fn granting_entities(&self, predicate: &PermissionPredicate) -> IdSet {
        self.reverse_index().granting_entities(predicate)
    }

    /// Which principals can actually do this?
    pub fn principals(&self, predicate: &PermissionPredicate) -> IdSet {
        self.reverse_index().principals(predicate)
    }

    /// How many principals reach an entity
    pub fn assignment_count(&self, entity_id: &str) -> usize {
        self.reverse_index().assignment_count(entity_id)
    }

    /// Structural closure of a bundle or group
    pub fn entity_closure(&self, id: &str) -> Result<Arc<Closure>> {
        self.materializer.entity_closure(id)
    }

    /// Bundles reachable from a group, first-discovered order
    pub fn bundle_closure(&self, id: &str) -> Result<Vec<EntityId>> {
        self.materializer.bundle_closure(id)
    }

    /// Resolution-scoped closure of a principal
    pub fn principal_closure(&self, id: &str) -> Result<Arc<Closure>> {
        self.materializer.principal_closure(id)
    }

    /// Adjacency data for external tree rendering
    pub fn hierarchy_nodes(&self) -> Vec<HierarchyNode> {
        self.materializer.hierarchy_nodes()
    }

    /// Hard-failure cycle check over the whole snapshot
    pub fn verify_acyclic(&self) -> Result<()> {
        self.materializer.verify_acyclic()
    }

    /// Built once per snapshot, on first reverse query
    fn reverse_index(&self) -> &ReverseIndex {
        self.reverse
            .get_or_init(|| Arc::new(ReverseIndex::build(&self.materializer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ResourceAccess, ResourceFlags};
    use crate::graph::records::{
        AssignmentRecord, GrantEntityRecord, MembershipRecord, PermissionGrant, PermissionRecord,
    };
    use crate::graph::store::{GraphBuilder, IntegrityPolicy};

    fn sample_engine() -> PermissionEngine {
        let mut b = GraphBuilder::new();
        b.push_entities([
            GrantEntityRecord::bundle("B1", "Deleter"),
            GrantEntityRecord::bundle("B2", "Editor"),
            GrantEntityRecord::group("G1", "Team", true),
        ]);
        b.push_memberships([MembershipRecord {
            group_id: "G1".into(),
            member_id: "B2".into(),
        }]);
        b.push_assignments([
            AssignmentRecord {
                principal_id: "U1".into(),
                entity_id: "B1".into(),
            },
            AssignmentRecord {
                principal_id: "U1".into(),
                entity_id: "G1".into(),
            },
        ]);
        b.push_permissions([
            PermissionRecord::new(
                "B1",
                PermissionGrant::resource(
                    "Account",
                    ResourceFlags {
                        delete: true,
                        ..Default::default()
                    },
                ),
            ),
            PermissionRecord::new(
                "B2",
                PermissionGrant::resource(
                    "Account",
                    ResourceFlags {
                        edit: true,
                        ..Default::default()
                    },
                ),
            ),
        ]);
        PermissionEngine::from_graph(b.freeze(IntegrityPolicy::Abort).unwrap())
    }

    #[test]
    fn test_resolve_through_facade() {
        let engine = sample_engine();
        let set = engine.resolve("U1").unwrap();
        assert!(set.resource("Account").delete);
        assert!(set.resource("Account").edit);
    }

    #[test]
    fn test_reverse_through_facade() {
        let engine = sample_engine();
        let pred = PermissionPredicate::resource("Account", ResourceAccess::Edit);
        assert!(engine.granting_entities(&pred).contains("B2"));
        assert!(engine.principals(&pred).contains("U1"));
        assert_eq!(engine.assignment_count("B2"), 1);
    }

    #[test]
    fn test_clones_share_the_snapshot() {
        let engine = sample_engine();
        let clone = engine.clone();
        assert_eq!(engine.snapshot_id(), clone.snapshot_id());
        // Reverse index is built once and shared
        let _ = engine.principals(&PermissionPredicate::capability("X"));
        assert!(clone.reverse.get().is_some());
    }

    #[test]
    fn test_stats_and_report() {
        let engine = sample_engine();
        assert_eq!(engine.stats().principals, 1);
        assert_eq!(engine.stats().groups, 1);
        assert!(!engine.report().is_partial());
        assert!(engine.verify_acyclic().is_ok());
    }
}
