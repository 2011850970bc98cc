//! Replaying an action log into a resolved [`EntitySet`].

use std::collections::BTreeSet;

use tracing::{debug, error, trace, warn};

use crate::config::ReduceConfig;
use crate::entities::{Constraint, ConstraintType, EntityRef, EntitySet, EntityValue, Member, Node};
use crate::errors::{ActionError, ReduceError};
use crate::geometry::{Line, Point};
use crate::graph::DependencyGraph;
use crate::history::{resolve_undos, Action};
use crate::resolve::{
    resolve_distributed_load_position, resolve_member_position, resolve_moment_load_position,
    resolve_node_position, resolve_point_load_position, resolve_support_position,
};
use crate::side_mounted::check_side_mounted_node_bounds;

/// Entity maps and dependency graph owned by one reduction pass.
///
/// [`reduce_history`] folds the effective history through [`ReductionState::apply`];
/// the state can also be driven by hand when actions arrive one at a time.
#[derive(Clone, Debug, Default)]
pub struct ReductionState {
    /// Current entities with their resolved positions.
    entities: EntitySet,
    /// Which entity reads which.
    graph: DependencyGraph,
    /// Tolerances in use.
    config: ReduceConfig,
}

impl ReductionState {
    /// Start from an empty frame.
    #[must_use]
    pub fn new(config: ReduceConfig) -> Self {
        Self {
            entities: EntitySet::new(),
            graph: DependencyGraph::new(),
            config,
        }
    }

    /// Entities as resolved so far. `dependants` lists are only filled in by
    /// [`ReductionState::finish`].
    #[must_use]
    pub fn entities(&self) -> &EntitySet {
        &self.entities
    }

    /// Dependency graph as built so far.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Apply one action.
    ///
    /// `Undo` entries are ignored here; they are consumed by [`resolve_undos`].
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] when the action references unknown entities, would
    /// introduce a dependency cycle, or leaves an entity unresolvable. The state
    /// must be discarded after an error.
    pub fn apply(&mut self, action: &Action) -> Result<(), ActionError> {
        trace!(%action, "applying action");
        match action {
            Action::Create { value } => self.create(value.clone()),
            Action::Update { value, previous } => self.update(value.clone(), previous),
            Action::Delete { target } => self.delete(target),
            Action::Undo => Ok(()),
        }
    }

    /// Fill in every `dependants` list and hand out the snapshot.
    #[must_use]
    pub fn finish(mut self) -> EntitySet {
        let graph = &self.graph;
        let direct_dependants = |entity: EntityRef| -> Vec<String> {
            graph
                .direct_dependants_of(&entity)
                .into_iter()
                .map(|dependant| dependant.id().to_string())
                .collect()
        };
        for node in self.entities.nodes.values_mut() {
            node.dependants = direct_dependants(EntityRef::Node(node.id.clone()));
        }
        for member in self.entities.members.values_mut() {
            member.dependants = direct_dependants(EntityRef::Member(member.id.clone()));
        }
        self.entities
    }

    /// Register, link and resolve a new entity, creating inline member ends first.
    fn create(&mut self, value: EntityValue) -> Result<(), ActionError> {
        let entity = value.entity_ref();
        EntityRef::checked(entity.kind(), entity.id())?;
        if self.entities.contains(&entity) {
            return Err(ActionError::DuplicateEntity(entity));
        }
        if let EntityValue::Member(member) = &value {
            self.create_missing_ends(member)?;
        }
        self.graph.add_node(entity.clone())?;
        self.link(&entity, &value.dependencies())?;
        let value = self.resolve_value(value)?;
        self.entities.insert(value);
        Ok(())
    }

    /// Replace an entity, re-link its dependencies and cascade to its dependants.
    fn update(&mut self, mut value: EntityValue, previous: &EntityValue) -> Result<(), ActionError> {
        let entity = value.entity_ref();
        let previous_entity = previous.entity_ref();
        if entity != previous_entity {
            return Err(ActionError::MismatchedUpdate {
                value: entity,
                previous: previous_entity,
            });
        }
        let current = self
            .entities
            .value_of(&entity)
            .ok_or_else(|| ActionError::UnknownEntity(entity.clone()))?;
        if let (EntityValue::Node(node), EntityValue::Node(stored)) = (&mut value, &current) {
            if node.assembly.is_none() {
                node.assembly = stored.assembly;
            }
        }
        if let EntityValue::Member(member) = &value {
            self.create_missing_ends(member)?;
        }

        let stale = current.dependencies();
        let fresh = value.dependencies();
        for dependency in stale.difference(&fresh) {
            self.graph.remove_dependency(&entity, dependency);
        }
        let added: BTreeSet<EntityRef> = fresh.difference(&stale).cloned().collect();
        self.link(&entity, &added)?;

        let value = self.resolve_value(value)?;
        let mut moved_members = Vec::new();
        match (&current, &value) {
            (EntityValue::Node(before), EntityValue::Node(after)) => {
                self.repin_distributed_loads(&after.id, before.resolved, after.resolved);
            }
            (EntityValue::Member(before), EntityValue::Member(_)) => {
                moved_members.push((before.id.clone(), before.resolved));
            }
            _ => {}
        }
        self.entities.insert(value);
        self.entities.clear_attention(&entity);
        self.cascade(&entity, moved_members)
    }

    /// Remove an entity; nodes with dependants are kept.
    fn delete(&mut self, target: &EntityRef) -> Result<(), ActionError> {
        if !self.entities.contains(target) {
            return Err(ActionError::UnknownEntity(target.clone()));
        }
        match target {
            EntityRef::Node(id) => {
                let dependants = self.graph.direct_dependants_of(target);
                if dependants.is_empty() {
                    self.remove(target);
                } else {
                    warn!(
                        node = %id,
                        dependants = dependants.len(),
                        "refusing to delete a node that other entities depend on"
                    );
                }
                Ok(())
            }
            EntityRef::Member(id) => self.delete_member(id),
            _ => {
                self.remove(target);
                Ok(())
            }
        }
    }

    /// Delete a member, detaching nodes mounted on it and dropping loads placed on it.
    ///
    /// Each end node goes too when nothing but loads still depends on it.
    fn delete_member(&mut self, id: &str) -> Result<(), ActionError> {
        let entity = EntityRef::Member(id.to_string());
        let member = self
            .entities
            .members
            .get(id)
            .cloned()
            .ok_or_else(|| ActionError::UnknownEntity(entity.clone()))?;

        for dependant in self.graph.direct_dependants_of(&entity) {
            match &dependant {
                EntityRef::Node(node_id) => self.detach_node(node_id, &entity),
                _ => self.remove(&dependant),
            }
        }
        self.remove(&entity);

        for node_id in member.node_ids() {
            let node = EntityRef::Node(node_id.to_string());
            if !self.entities.contains(&node) {
                continue;
            }
            let remaining = self.graph.direct_dependants_of(&node);
            if remaining.iter().all(|dependant| dependant.kind().is_load()) {
                for load in &remaining {
                    self.remove(load);
                }
                self.remove(&node);
                debug!(member = %id, node = %node_id, "removed orphaned end node");
            }
        }
        Ok(())
    }

    /// Pin a node where it currently is and cut it loose from `host`.
    fn detach_node(&mut self, node_id: &str, host: &EntityRef) {
        let Some(node) = self.entities.nodes.get_mut(node_id) else {
            return;
        };
        let dependencies = EntityValue::Node(node.clone()).dependencies();
        node.constraint1 = Constraint::x(node.resolved.x);
        node.constraint2 = Constraint::y(node.resolved.y);
        let entity = EntityRef::Node(node_id.to_string());
        for dependency in &dependencies {
            self.graph.remove_dependency(&entity, dependency);
        }
        debug!(node = %node_id, %host, "detached node from deleted member");
    }

    /// Drop an entity from both the maps and the graph.
    fn remove(&mut self, entity: &EntityRef) {
        self.entities.remove(entity);
        self.graph.remove_node(entity);
    }

    /// Create end nodes that a member defines inline and that do not exist yet.
    fn create_missing_ends(&mut self, member: &Member) -> Result<(), ActionError> {
        if member.node1.id == member.node2.id {
            return Err(ActionError::DegenerateMember {
                member: member.id.clone(),
                node: member.node1.id.clone(),
            });
        }
        for end in [&member.node1, &member.node2] {
            if self.entities.nodes.contains_key(&end.id) {
                continue;
            }
            let Some(definition) = &end.definition else {
                return Err(ActionError::UnknownEntity(EntityRef::Node(end.id.clone())));
            };
            let node = Node::new(
                end.id.clone(),
                definition.constraint1.clone(),
                definition.constraint2.clone(),
            )
            .with_assembly(end.assembly);
            self.create(EntityValue::Node(node))?;
        }
        Ok(())
    }

    /// Add `entity → dependency` edges, failing on unknown dependencies.
    fn link(
        &mut self,
        entity: &EntityRef,
        dependencies: &BTreeSet<EntityRef>,
    ) -> Result<(), ActionError> {
        for dependency in dependencies {
            if !self.entities.contains(dependency) {
                return Err(ActionError::UnknownEntity(dependency.clone()));
            }
            self.graph.add_dependency(entity, dependency)?;
        }
        Ok(())
    }

    /// Recompute the resolved field of `value` from the current snapshot.
    fn resolve_value(&self, value: EntityValue) -> Result<EntityValue, ActionError> {
        let lookup = &self.entities;
        let value = match value {
            EntityValue::Node(mut node) => {
                node.resolved = resolve_node_position(&node, lookup)?;
                node.assembly = Some(node.assembly());
                EntityValue::Node(node)
            }
            EntityValue::Member(mut member) => {
                member.resolved = resolve_member_position(&member, lookup)?;
                for end in [&mut member.node1, &mut member.node2] {
                    end.definition = None;
                    if let Some(node) = lookup.nodes.get(&end.id) {
                        end.assembly = node.assembly();
                    }
                }
                EntityValue::Member(member)
            }
            EntityValue::PointLoad(mut load) => {
                load.resolved = resolve_point_load_position(&load, lookup)?;
                EntityValue::PointLoad(load)
            }
            EntityValue::DistributedLoad(mut load) => {
                load.resolved = resolve_distributed_load_position(&load, lookup)?;
                EntityValue::DistributedLoad(load)
            }
            EntityValue::MomentLoad(mut load) => {
                load.resolved = resolve_moment_load_position(&load, lookup)?;
                EntityValue::MomentLoad(load)
            }
            EntityValue::Support(mut support) => {
                support.resolved = resolve_support_position(&support, lookup)?;
                EntityValue::Support(support)
            }
        };
        Ok(value)
    }

    /// Re-resolve a stored entity in place.
    fn refresh(&mut self, entity: &EntityRef) -> Result<(), ActionError> {
        let value = self
            .entities
            .value_of(entity)
            .ok_or_else(|| ActionError::UnknownEntity(entity.clone()))?;
        let value = self.resolve_value(value)?;
        self.entities.insert(value);
        Ok(())
    }

    /// Re-resolve every transitive dependant of `entity`, then check the span of
    /// every member that moved, including the ones passed in `moved_members`.
    fn cascade(
        &mut self,
        entity: &EntityRef,
        mut moved_members: Vec<(String, Line)>,
    ) -> Result<(), ActionError> {
        let worklist = self.graph.dependants_of(entity)?;
        debug!(%entity, dependants = worklist.len(), "cascading re-resolution");
        for dependant in &worklist {
            let before = match dependant {
                EntityRef::Member(id) => self
                    .entities
                    .members
                    .get(id)
                    .map(|member| (id.clone(), member.resolved)),
                _ => None,
            };
            self.refresh(dependant)?;
            moved_members.extend(before);
        }

        for (member_id, before) in moved_members {
            let Some(after) = self.entities.members.get(&member_id).map(|m| m.resolved) else {
                continue;
            };
            let updates =
                check_side_mounted_node_bounds(&member_id, &before, &after, &self.entities, &self.config);
            for update in updates {
                if !self.entities.needs_attention(&update.entity) {
                    warn!(entity = %update.entity, member = %member_id, "entity left its member");
                }
                self.entities.flag_attention(&update.entity, update.reason);
            }
        }
        Ok(())
    }

    /// Keep distributed-load ends that sat on a node's old coordinate on the node.
    fn repin_distributed_loads(&mut self, node_id: &str, before: Point, after: Point) {
        if before == after {
            return;
        }
        let members: BTreeSet<&str> = self
            .entities
            .members
            .values()
            .filter(|member| member.has_end(node_id))
            .map(|member| member.id.as_str())
            .collect();
        let tolerance = self.config.pinned_endpoint_tolerance;
        for load in self.entities.distributed_loads.values_mut() {
            if !members.contains(load.on_member.id.as_str()) {
                continue;
            }
            let span = &mut load.on_member;
            for constraint in [&mut span.constraint_start, &mut span.constraint_end] {
                let (old, new) = match constraint.kind {
                    ConstraintType::X => (before.x, after.x),
                    ConstraintType::Y => (before.y, after.y),
                    _ => continue,
                };
                if (constraint.value - old).abs() < tolerance {
                    trace!(load = %load.id, from = old, to = new, "re-pinning distributed load end");
                    constraint.value = new;
                }
            }
        }
    }
}

/// Reduce an action log with the default [`ReduceConfig`].
///
/// # Errors
///
/// Returns [`ReduceError`] naming the first action that could not be applied.
///
/// # Examples
/// ```
/// use framex::{reduce_history, Action, Attachment, Constraint, Member, Node, PointLoad};
///
/// let set = reduce_history(&[
///     Action::create(Node::fixed("n1", 0.0, 0.0)),
///     Action::create(Node::fixed("n2", 10.0, 0.0)),
///     Action::create(Member::new("m1", "n1", "n2")),
///     Action::create(PointLoad::new("pl1", Attachment::member("m1", Constraint::x(5.0)), 10.0)),
/// ])
/// .unwrap();
/// assert_eq!(set.point_loads["pl1"].resolved.x, 5.0);
/// assert_eq!(set.nodes["n1"].dependants, vec!["m1".to_string()]);
/// ```
pub fn reduce_history(history: &[Action]) -> Result<EntitySet, ReduceError> {
    reduce_history_with(history, &ReduceConfig::default())
}

/// Reduce an action log with explicit tolerances.
///
/// Undo entries are resolved first; the remaining actions are folded into a
/// fresh [`ReductionState`]. The first failing action aborts the reduction.
///
/// # Errors
///
/// Returns [`ReduceError`] naming the first action that could not be applied.
pub fn reduce_history_with(
    history: &[Action],
    config: &ReduceConfig,
) -> Result<EntitySet, ReduceError> {
    let effective = resolve_undos(history);
    debug!(
        logged = history.len(),
        effective = effective.len(),
        "reducing action log"
    );
    let state = effective.into_iter().enumerate().try_fold(
        ReductionState::new(*config),
        |mut state, (index, action)| match state.apply(action) {
            Ok(()) => Ok(state),
            Err(source) => {
                error!(index, ?action, %source, "aborting reduction");
                Err(ReduceError::Action {
                    index,
                    action: action.to_string(),
                    source,
                })
            }
        },
    )?;
    Ok(state.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Assembly, Attachment, DistributedLoad, MemberEnd, MemberSpan, PointLoad};
    use crate::geometry::{line, point};

    fn portal() -> Vec<Action> {
        vec![
            Action::create(Node::fixed("n1", 0.0, 0.0)),
            Action::create(Node::fixed("n2", 10.0, 0.0)),
            Action::create(Member::new("m1", "n1", "n2")),
        ]
    }

    #[test]
    fn members_follow_their_nodes() {
        let mut history = portal();
        history.push(Action::update(
            Node::fixed("n2", 8.0, 2.0),
            Node::fixed("n2", 10.0, 0.0),
        ));
        let set = reduce_history(&history).unwrap();
        assert_eq!(set.members["m1"].resolved, line(0.0, 0.0, 8.0, 2.0));
        assert_eq!(set.members["m1"].dependants, Vec::<String>::new());
        assert_eq!(set.nodes["n2"].dependants, vec!["m1".to_string()]);
    }

    #[test]
    fn create_rejects_duplicates_and_foreign_prefixes() {
        let mut history = portal();
        history.push(Action::create(Node::fixed("n1", 1.0, 1.0)));
        let error = reduce_history(&history).unwrap_err();
        assert_eq!(
            error.action_error(),
            &ActionError::DuplicateEntity(EntityRef::Node("n1".into()))
        );

        let error = reduce_history(&[Action::create(Node::fixed("m7", 0.0, 0.0))]).unwrap_err();
        assert!(matches!(error.action_error(), ActionError::Id(_)));
    }

    #[test]
    fn member_may_define_its_end_nodes_inline() {
        let member = Member::between(
            "m1",
            MemberEnd::defined("n1", Constraint::x(0.0), Constraint::y(0.0)),
            MemberEnd::defined("n2", Constraint::x(0.0), Constraint::y(3.0)),
        );
        let set = reduce_history(&[Action::create(member)]).unwrap();
        assert_eq!(set.nodes.len(), 2);
        assert_eq!(set.members["m1"].resolved, line(0.0, 0.0, 0.0, 3.0));
        assert!(set.members["m1"].node1.definition.is_none());

        let missing = reduce_history(&[Action::create(Member::new("m1", "n1", "n2"))]);
        assert!(matches!(
            missing.unwrap_err().action_error(),
            ActionError::UnknownEntity(EntityRef::Node(_))
        ));

        let looped = reduce_history(&[
            Action::create(Node::fixed("n1", 0.0, 0.0)),
            Action::create(Member::new("m1", "n1", "n1")),
        ]);
        assert!(matches!(
            looped.unwrap_err().action_error(),
            ActionError::DegenerateMember { .. }
        ));
    }

    #[test]
    fn distributed_load_ends_follow_a_moved_node() {
        let mut history = portal();
        let span = MemberSpan {
            id: "m1".into(),
            constraint_start: Constraint::x(0.0),
            constraint_end: Constraint::x(10.0),
        };
        history.push(Action::create(DistributedLoad::new(
            "dl1", span, 2.0,
        )));
        history.push(Action::update(
            Node::fixed("n2", 6.0, 0.0),
            Node::fixed("n2", 10.0, 0.0),
        ));
        let set = reduce_history(&history).unwrap();
        let load = &set.distributed_loads["dl1"];
        assert_eq!(load.on_member.constraint_end.value, 6.0);
        assert_eq!(load.on_member.constraint_start.value, 0.0);
        assert_eq!(load.resolved, line(0.0, 0.0, 6.0, 0.0));
    }

    #[test]
    fn distributed_loads_away_from_the_node_stay_put() {
        let mut history = portal();
        let span = MemberSpan {
            id: "m1".into(),
            constraint_start: Constraint::x(2.0),
            constraint_end: Constraint::x(9.9),
        };
        history.push(Action::create(DistributedLoad::new(
            "dl1", span, 2.0,
        )));
        history.push(Action::update(
            Node::fixed("n2", 12.0, 0.0),
            Node::fixed("n2", 10.0, 0.0),
        ));
        let set = reduce_history(&history).unwrap();
        assert_eq!(set.distributed_loads["dl1"].on_member.constraint_end.value, 9.9);
    }

    #[test]
    fn explicit_update_clears_the_attention_flag() {
        let mut history = portal();
        let load = PointLoad::new("pl1", Attachment::member("m1", Constraint::x(8.0)), 5.0);
        history.push(Action::create(load.clone()));
        history.push(Action::update(
            Node::fixed("n2", 4.0, 0.0),
            Node::fixed("n2", 10.0, 0.0),
        ));
        let flagged = reduce_history(&history).unwrap();
        assert!(flagged.point_loads["pl1"].needs_attention);

        let repinned = PointLoad::new("pl1", Attachment::member("m1", Constraint::x(3.0)), 5.0);
        history.push(Action::update(repinned, load));
        let set = reduce_history(&history).unwrap();
        let load = &set.point_loads["pl1"];
        assert!(!load.needs_attention);
        assert_eq!(load.attention_reason, None);
        assert_eq!(load.resolved, point(3.0, 0.0));
    }

    #[test]
    fn update_without_assembly_keeps_the_stored_one() {
        let stiff = Node::fixed("n2", 10.0, 0.0).with_assembly(Assembly::Stiff);
        let history = vec![
            Action::create(Node::fixed("n1", 0.0, 0.0)),
            Action::create(stiff.clone()),
            Action::create(Member::new("m1", "n1", "n2")),
            Action::update(Node::fixed("n2", 8.0, 0.0), stiff),
        ];
        let set = reduce_history(&history).unwrap();
        assert_eq!(set.nodes["n2"].assembly, Some(Assembly::Stiff));
        assert_eq!(set.nodes["n1"].assembly, Some(Assembly::Hinge));
        assert_eq!(set.members["m1"].node2.assembly, Assembly::Stiff);
        assert_eq!(set.members["m1"].resolved.point2, point(8.0, 0.0));
    }

    #[test]
    fn mismatched_update_is_corrupt() {
        let mut history = portal();
        history.push(Action::update(
            Node::fixed("n2", 6.0, 0.0),
            Node::fixed("n1", 0.0, 0.0),
        ));
        let error = reduce_history(&history).unwrap_err();
        assert_eq!(
            error,
            ReduceError::Action {
                index: 3,
                action: "update node \"n2\"".to_string(),
                source: ActionError::MismatchedUpdate {
                    value: EntityRef::Node("n2".into()),
                    previous: EntityRef::Node("n1".into()),
                },
            }
        );
    }

    #[test]
    fn state_can_be_driven_action_by_action() {
        let mut state = ReductionState::new(ReduceConfig::default());
        for action in portal() {
            state.apply(&action).unwrap();
        }
        assert_eq!(state.graph().len(), 3);
        assert_eq!(state.entities().members["m1"].resolved.point2, point(10.0, 0.0));
        let set = state.finish();
        assert_eq!(set.nodes["n1"].dependants, vec!["m1".to_string()]);
    }
}
