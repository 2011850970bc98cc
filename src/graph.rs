//! Dependency tracking between entities.
//!
//! An edge `a → b` records that the resolved state of `a` is read from `b`.

use std::collections::{HashMap, HashSet};

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::Dfs;
use petgraph::Direction;

use crate::entities::EntityRef;
use crate::errors::GraphError;

/// Directed acyclic graph of entity dependencies.
///
/// Insertion of an edge that would close a cycle is rejected, so every query
/// below can rely on the graph being acyclic.
///
/// # Examples
/// ```
/// use framex::{DependencyGraph, EntityRef};
///
/// let node = EntityRef::Node("n1".into());
/// let member = EntityRef::Member("m1".into());
/// let mut graph = DependencyGraph::new();
/// graph.add_node(node.clone()).unwrap();
/// graph.add_node(member.clone()).unwrap();
/// graph.add_dependency(&member, &node).unwrap();
///
/// assert_eq!(graph.direct_dependants_of(&node), vec![member.clone()]);
/// assert!(graph.add_dependency(&node, &member).is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    /// Underlying graph storage; indices stay valid across removals.
    graph: StableDiGraph<EntityRef, ()>,
    /// Index of every registered entity.
    indices: HashMap<EntityRef, NodeIndex>,
}

impl DependencyGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether no entity is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Whether `entity` is registered.
    #[must_use]
    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.indices.contains_key(entity)
    }

    /// Register an entity without dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateEntity`] when the entity is already registered.
    pub fn add_node(&mut self, entity: EntityRef) -> Result<(), GraphError> {
        if self.indices.contains_key(&entity) {
            return Err(GraphError::DuplicateEntity(entity));
        }
        let index = self.graph.add_node(entity.clone());
        self.indices.insert(entity, index);
        Ok(())
    }

    /// Remove an entity together with all of its edges.
    ///
    /// Returns whether the entity was registered.
    pub fn remove_node(&mut self, entity: &EntityRef) -> bool {
        match self.indices.remove(entity) {
            Some(index) => self.graph.remove_node(index).is_some(),
            None => false,
        }
    }

    /// Record that `dependant` reads the resolved state of `dependency`.
    ///
    /// Adding an existing edge is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownEntity`] when either entity is missing and
    /// [`GraphError::Cycle`] when `dependency` already depends on `dependant`.
    pub fn add_dependency(
        &mut self,
        dependant: &EntityRef,
        dependency: &EntityRef,
    ) -> Result<(), GraphError> {
        let from = self.index(dependant)?;
        let to = self.index(dependency)?;
        if from == to || has_path_connecting(&self.graph, to, from, None) {
            return Err(GraphError::Cycle {
                dependant: dependant.clone(),
                dependency: dependency.clone(),
            });
        }
        self.graph.update_edge(from, to, ());
        Ok(())
    }

    /// Drop the edge `dependant → dependency`.
    ///
    /// Returns whether the edge existed.
    pub fn remove_dependency(&mut self, dependant: &EntityRef, dependency: &EntityRef) -> bool {
        let (Some(&from), Some(&to)) = (self.indices.get(dependant), self.indices.get(dependency))
        else {
            return false;
        };
        match self.graph.find_edge(from, to) {
            Some(edge) => self.graph.remove_edge(edge).is_some(),
            None => false,
        }
    }

    /// Entities that `entity` reads directly, sorted.
    #[must_use]
    pub fn dependencies_of(&self, entity: &EntityRef) -> Vec<EntityRef> {
        self.neighbours(entity, Direction::Outgoing)
    }

    /// Entities that read `entity` directly, sorted.
    #[must_use]
    pub fn direct_dependants_of(&self, entity: &EntityRef) -> Vec<EntityRef> {
        self.neighbours(entity, Direction::Incoming)
    }

    /// Every entity that transitively reads `entity`, ordered so that each one
    /// comes after everything it depends on.
    ///
    /// Recomputing the entries front to back therefore never reads a stale value.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownEntity`] when `entity` is not registered.
    pub fn dependants_of(&self, entity: &EntityRef) -> Result<Vec<EntityRef>, GraphError> {
        let start = self.index(entity)?;
        let reversed = petgraph::visit::Reversed(&self.graph);
        let mut reachable = HashSet::new();
        let mut dfs = Dfs::new(reversed, start);
        while let Some(index) = dfs.next(reversed) {
            if index != start {
                reachable.insert(index);
            }
        }
        if reachable.is_empty() {
            return Ok(Vec::new());
        }
        // toposort puts dependants before their dependencies
        let order = toposort(&self.graph, None).map_err(|cycle| {
            let entity = self.graph[cycle.node_id()].clone();
            GraphError::Cycle {
                dependant: entity.clone(),
                dependency: entity,
            }
        })?;
        Ok(order
            .into_iter()
            .rev()
            .filter(|index| reachable.contains(index))
            .map(|index| self.graph[index].clone())
            .collect())
    }

    /// Graph index of a registered entity.
    fn index(&self, entity: &EntityRef) -> Result<NodeIndex, GraphError> {
        self.indices
            .get(entity)
            .copied()
            .ok_or_else(|| GraphError::UnknownEntity(entity.clone()))
    }

    /// Sorted direct neighbours of `entity` in one direction; empty when unknown.
    fn neighbours(&self, entity: &EntityRef, direction: Direction) -> Vec<EntityRef> {
        let Some(&index) = self.indices.get(entity) else {
            return Vec::new();
        };
        let mut neighbours: Vec<EntityRef> = self
            .graph
            .neighbors_directed(index, direction)
            .map(|neighbour| self.graph[neighbour].clone())
            .collect();
        neighbours.sort();
        neighbours.dedup();
        neighbours
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> EntityRef {
        EntityRef::Node(id.to_string())
    }

    fn member(id: &str) -> EntityRef {
        EntityRef::Member(id.to_string())
    }

    /// n1, n2 ← m1 ← n3 ← m2 → n4, with pl1 on m2.
    fn frame() -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for entity in [
            node("n1"),
            node("n2"),
            member("m1"),
            node("n3"),
            node("n4"),
            member("m2"),
            EntityRef::PointLoad("pl1".into()),
        ] {
            graph.add_node(entity).expect("fresh entity");
        }
        graph.add_dependency(&member("m1"), &node("n1")).unwrap();
        graph.add_dependency(&member("m1"), &node("n2")).unwrap();
        graph.add_dependency(&node("n3"), &member("m1")).unwrap();
        graph.add_dependency(&member("m2"), &node("n3")).unwrap();
        graph.add_dependency(&member("m2"), &node("n4")).unwrap();
        graph
            .add_dependency(&EntityRef::PointLoad("pl1".into()), &member("m2"))
            .unwrap();
        graph
    }

    #[test]
    fn transitive_dependants_come_in_dependency_order() {
        let graph = frame();
        let order = graph.dependants_of(&node("n1")).unwrap();
        assert_eq!(
            order,
            vec![
                member("m1"),
                node("n3"),
                member("m2"),
                EntityRef::PointLoad("pl1".into())
            ]
        );
        assert!(graph.dependants_of(&node("n4")).unwrap().len() == 2);
        assert!(graph
            .dependants_of(&EntityRef::PointLoad("pl1".into()))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn cycles_are_rejected() {
        let mut graph = frame();
        let error = graph
            .add_dependency(&node("n1"), &member("m2"))
            .expect_err("n1 feeds m2");
        assert_eq!(
            error,
            GraphError::Cycle {
                dependant: node("n1"),
                dependency: member("m2"),
            }
        );
        assert!(graph.add_dependency(&node("n1"), &node("n1")).is_err());
    }

    #[test]
    fn removing_a_node_drops_its_edges() {
        let mut graph = frame();
        assert!(graph.remove_node(&member("m2")));
        assert!(graph.direct_dependants_of(&node("n3")).is_empty());
        assert!(graph
            .dependencies_of(&EntityRef::PointLoad("pl1".into()))
            .is_empty());
        assert!(!graph.remove_node(&member("m2")));
        assert_eq!(graph.len(), 6);
    }

    #[test]
    fn dependencies_can_be_moved() {
        let mut graph = frame();
        assert!(graph.remove_dependency(&node("n3"), &member("m1")));
        assert!(!graph.remove_dependency(&node("n3"), &member("m1")));
        graph.add_dependency(&node("n3"), &node("n4")).unwrap();
        assert_eq!(graph.dependencies_of(&node("n3")), vec![node("n4")]);
        assert!(graph.dependants_of(&node("n1")).unwrap() == vec![member("m1")]);
    }

    #[test]
    fn unknown_entities_are_reported() {
        let mut graph = DependencyGraph::new();
        graph.add_node(node("n1")).unwrap();
        assert_eq!(
            graph.add_node(node("n1")),
            Err(GraphError::DuplicateEntity(node("n1")))
        );
        assert_eq!(
            graph.add_dependency(&member("m9"), &node("n1")),
            Err(GraphError::UnknownEntity(member("m9")))
        );
        assert_eq!(
            graph.dependants_of(&node("n2")),
            Err(GraphError::UnknownEntity(node("n2")))
        );
    }
}
