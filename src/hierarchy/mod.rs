/*!
 * Hierarchy Materializer
 * Expands group membership into memoized transitive closures
 *
 * Membership is a DAG in principle but never trusted to be one: traversal
 * carries an in-progress marker per node, so a group that reaches itself
 * transitively is reported as a named cycle and expansion stops at the
 * cycle point instead of hanging or overflowing the stack.
 */

use crate::core::errors::{EngineError, Result};
use crate::core::limits::MAX_CLOSURE_DEPTH;
use crate::core::types::{EntityId, EntityKind, PrincipalId};
use crate::graph::store::PermissionGraph;
use ahash::RandomState;
use dashmap::DashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// The transitive expansion of reachability for one root.
///
/// `entities` is insertion-ordered (first discovered first) for display
/// determinism only; membership semantics are order-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Closure {
    pub entities: Vec<EntityId>,
    /// Each detected cycle, named by its member path
    pub cycles: Vec<Vec<EntityId>>,
    /// Set when expansion hit the depth cap (pathological nesting)
    pub truncated: bool,
}

impl Closure {
    /// True when the closure does not cover everything the data implied
    pub fn is_partial(&self) -> bool {
        !self.cycles.is_empty() || self.truncated
    }
}

/// Adjacency data for external tree/graph rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HierarchyNode {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub active: bool,
    pub children: Vec<EntityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Done,
}

struct Frame {
    id: EntityId,
    next_child: usize,
}

/// Expands memberships over one frozen graph, memoizing per root.
///
/// Cheap to clone via `Arc`; all caches are per snapshot and never
/// invalidated (recomputation means a fresh snapshot and a fresh
/// materializer).
pub struct Materializer {
    graph: Arc<PermissionGraph>,
    entity_closures: DashMap<EntityId, Arc<Closure>, RandomState>,
    principal_closures: DashMap<PrincipalId, Arc<Closure>, RandomState>,
}

impl Materializer {
    pub fn new(graph: Arc<PermissionGraph>) -> Self {
        Self {
            graph,
            entity_closures: DashMap::with_hasher(RandomState::new()),
            principal_closures: DashMap::with_hasher(RandomState::new()),
        }
    }

    pub fn graph(&self) -> &Arc<PermissionGraph> {
        &self.graph
    }

    /// Structural closure of an entity: every member reachable from it,
    /// regardless of active status. The root itself is not part of the
    /// result. Bundles have no members, so their closure is empty.
    pub fn entity_closure(&self, id: &str) -> Result<Arc<Closure>> {
        if let Some(cached) = self.entity_closures.get(id) {
            return Ok(cached.clone());
        }
        self.graph.entity(id)?;
        let closure = Arc::new(self.expand(std::slice::from_ref(&id.to_string()), false, false));
        self.entity_closures
            .insert(id.to_string(), closure.clone());
        Ok(closure)
    }

    /// The bundles reachable from a group, in first-discovered order
    pub fn bundle_closure(&self, id: &str) -> Result<Vec<EntityId>> {
        let closure = self.entity_closure(id)?;
        Ok(closure
            .entities
            .iter()
            .filter(|e| {
                self.graph
                    .entity(e)
                    .map(|ent| !ent.kind.is_group())
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    /// Resolution-scoped closure of a principal: every grant entity whose
    /// permissions apply to it. Directly-assigned bundles always count;
    /// groups (directly assigned or nested) count and expand only while
    /// active — an inactive group contributes nothing, but its member
    /// bundles still apply wherever they are reachable another way.
    pub fn principal_closure(&self, id: &str) -> Result<Arc<Closure>> {
        if let Some(cached) = self.principal_closures.get(id) {
            return Ok(cached.clone());
        }
        let principal = self.graph.principal(id)?;
        let closure = Arc::new(self.expand(&principal.direct, true, true));
        self.principal_closures
            .insert(id.to_string(), closure.clone());
        Ok(closure)
    }

    /// Pure adjacency for tree rendering: every entity with its direct
    /// children, groups first, each section sorted by id.
    pub fn hierarchy_nodes(&self) -> Vec<HierarchyNode> {
        let mut nodes: Vec<HierarchyNode> = self
            .graph
            .entities()
            .map(|e| HierarchyNode {
                id: e.id.clone(),
                name: e.name.clone(),
                kind: e.kind,
                active: e.active,
                children: self.graph.members_of(&e.id).to_vec(),
            })
            .collect();
        nodes.sort_by(|a, b| {
            (a.kind != EntityKind::Group, &a.id).cmp(&(b.kind != EntityKind::Group, &b.id))
        });
        nodes
    }

    /// Hard-failure check: surfaces the first membership cycle in the
    /// snapshot as an error. Callers that can live with partial closures
    /// can skip this and inspect `Closure::cycles` instead.
    pub fn verify_acyclic(&self) -> Result<()> {
        for entity in self.graph.entities() {
            if !entity.kind.is_group() {
                continue;
            }
            let closure = self.entity_closure(&entity.id)?;
            if let Some(cycle) = closure.cycles.first() {
                return Err(EngineError::HierarchyCycle {
                    members: cycle.clone(),
                });
            }
        }
        Ok(())
    }

    /// Iterative depth-first expansion with a shared done-set, so a node
    /// reachable via two paths (diamond membership) contributes once.
    ///
    /// `resolution` applies the active-group rule; `include_roots` puts the
    /// roots themselves into the result (principal closures do, entity
    /// closures do not).
    fn expand(&self, roots: &[EntityId], resolution: bool, include_roots: bool) -> Closure {
        let graph = &self.graph;
        let mut order: Vec<EntityId> = Vec::new();
        let mut state: HashMap<EntityId, VisitState, RandomState> =
            HashMap::with_hasher(RandomState::new());
        let mut cycles: Vec<Vec<EntityId>> = Vec::new();
        let mut truncated = false;

        for root in roots {
            if state.contains_key(root) {
                continue;
            }
            // Freeze validated every id in the graph, so a missing root
            // here is a programming error, not source data.
            let Ok(entity) = graph.entity(root) else {
                continue;
            };
            if resolution && entity.kind.is_group() && !entity.active {
                debug!("excluding inactive group {root} from resolution closure");
                state.insert(root.clone(), VisitState::Done);
                continue;
            }
            state.insert(root.clone(), VisitState::InProgress);
            if include_roots {
                order.push(root.clone());
            }
            let mut stack = vec![Frame {
                id: root.clone(),
                next_child: 0,
            }];
            let mut path = vec![root.clone()];

            while let Some(frame) = stack.last_mut() {
                let members = graph.members_of(&frame.id);
                if frame.next_child >= members.len() {
                    state.insert(frame.id.clone(), VisitState::Done);
                    stack.pop();
                    path.pop();
                    continue;
                }
                let child = members[frame.next_child].clone();
                frame.next_child += 1;

                match state.get(&child) {
                    Some(VisitState::InProgress) => {
                        // Back edge: name the cycle from its first member
                        let start = path.iter().position(|p| *p == child).unwrap_or(0);
                        let mut cycle: Vec<EntityId> = path[start..].to_vec();
                        cycle.push(child.clone());
                        warn!("membership cycle: {}", cycle.join(" -> "));
                        cycles.push(cycle);
                    }
                    Some(VisitState::Done) => {}
                    None => {
                        let Ok(child_entity) = graph.entity(&child) else {
                            continue;
                        };
                        if resolution
                            && child_entity.kind.is_group()
                            && !child_entity.active
                        {
                            debug!(
                                "excluding inactive group {child} from resolution closure"
                            );
                            state.insert(child, VisitState::Done);
                            continue;
                        }
                        if stack.len() >= MAX_CLOSURE_DEPTH {
                            warn!(
                                "closure depth cap hit at {child}; truncating expansion"
                            );
                            truncated = true;
                            state.insert(child, VisitState::Done);
                            continue;
                        }
                        state.insert(child.clone(), VisitState::InProgress);
                        order.push(child.clone());
                        path.push(child.clone());
                        stack.push(Frame {
                            id: child,
                            next_child: 0,
                        });
                    }
                }
            }
        }

        Closure {
            entities: order,
            cycles,
            truncated,
        }
    }
}
