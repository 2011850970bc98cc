//! Error types produced while resolving constraints or replaying an action log.

use thiserror::Error;

use crate::entities::{ConstraintType, EntityKind, EntityRef};

/// Error returned when an entity identifier cannot be interpreted.
///
/// # Examples
///
/// ```
/// use framex::{EntityRef, IdError};
///
/// let error = EntityRef::from_id("q7").expect_err("unknown prefix is rejected");
/// assert_eq!(error, IdError::UnknownPrefix("q7".to_string()));
/// ```
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IdError {
    /// Returned when the prefix of an identifier names no entity kind.
    #[error("identifier {0:?} does not start with a known entity prefix")]
    UnknownPrefix(String),
    /// Returned when an identifier's prefix disagrees with the declared kind.
    #[error("identifier {id:?} cannot name a {expected}")]
    KindMismatch {
        /// Offending identifier.
        id: String,
        /// Kind the identifier was declared as.
        expected: EntityKind,
    },
}

/// Error returned by the dependency graph.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// Returned when an entity is not registered in the graph.
    #[error("{0} is not part of the dependency graph")]
    UnknownEntity(EntityRef),
    /// Returned when an entity is registered twice.
    #[error("{0} is already part of the dependency graph")]
    DuplicateEntity(EntityRef),
    /// Returned when a dependency would make the graph cyclic.
    #[error("{dependant} cannot depend on {dependency}: it would create a cycle")]
    Cycle {
        /// Entity that would gain the dependency.
        dependant: EntityRef,
        /// Entity it would depend on.
        dependency: EntityRef,
    },
}

/// Error returned when a constraint pair cannot be turned into coordinates.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ResolveError {
    /// Returned when the two constraint types form no supported pair or lack
    /// a required context node or member reference.
    #[error("{first:?} and {second:?} do not form a valid constraint pair")]
    InvalidConstraintPair {
        /// Type of the first constraint.
        first: ConstraintType,
        /// Type of the second constraint.
        second: ConstraintType,
    },
    /// Returned when a referenced node has no resolved position.
    #[error("node {0:?} is referenced but has not been resolved")]
    MissingNode(String),
    /// Returned when a referenced member has no resolved position.
    #[error("member {0:?} is referenced but has not been resolved")]
    MissingMember(String),
    /// Returned when the construction lines are parallel.
    #[error("constraints of pair {0} do not intersect")]
    NoIntersection(&'static str),
}

/// Error raised while applying a single action.
#[derive(Debug, Error, PartialEq)]
pub enum ActionError {
    /// Returned when an action references an entity that does not exist.
    #[error("{0} does not exist")]
    UnknownEntity(EntityRef),
    /// Returned when a create action reuses an existing identifier.
    #[error("{0} already exists")]
    DuplicateEntity(EntityRef),
    /// Returned when the new and previous values of an update disagree on identity.
    #[error("update of {value} carries previous value for {previous}")]
    MismatchedUpdate {
        /// Entity named by the new value.
        value: EntityRef,
        /// Entity named by the previous value.
        previous: EntityRef,
    },
    /// Returned when both ends of a member are the same node.
    #[error("member {member:?} starts and ends at node {node:?}")]
    DegenerateMember {
        /// Identifier of the member.
        member: String,
        /// Node used for both ends.
        node: String,
    },
    /// Returned when an identifier is malformed.
    #[error(transparent)]
    Id(#[from] IdError),
    /// Returned when the dependency graph rejects an edit.
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// Returned when an entity position cannot be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Error returned when an action log cannot be reduced.
///
/// Replay is all-or-nothing, so the error names the first action that failed.
#[derive(Debug, Error, PartialEq)]
pub enum ReduceError {
    /// Returned when applying the action at `index` of the effective history fails.
    #[error("action #{index} ({action}) could not be applied: {source}")]
    Action {
        /// Position of the action in the history after undo resolution.
        index: usize,
        /// Short description of the action.
        action: String,
        /// Reason the action failed.
        #[source]
        source: ActionError,
    },
}

impl ReduceError {
    /// The underlying reason the reduction stopped.
    #[must_use]
    pub fn action_error(&self) -> &ActionError {
        match self {
            Self::Action { source, .. } => source,
        }
    }
}
