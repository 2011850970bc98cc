//! Edit actions and undo resolution.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entities::{EntityRef, EntityValue};

/// One entry of the append-only edit log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    /// Add a new entity.
    Create {
        /// Entity to add.
        value: EntityValue,
    },
    /// Replace an existing entity.
    Update {
        /// New value of the entity.
        value: EntityValue,
        /// Value before the edit, identifying the same entity.
        previous: EntityValue,
    },
    /// Remove an entity, subject to the delete cascade rules.
    Delete {
        /// Entity to remove.
        target: EntityRef,
    },
    /// Revert the latest action that has not been reverted yet.
    Undo,
}

impl Action {
    /// Shorthand for [`Action::Create`].
    #[must_use]
    pub fn create(value: impl Into<EntityValue>) -> Self {
        Self::Create {
            value: value.into(),
        }
    }

    /// Shorthand for [`Action::Update`].
    #[must_use]
    pub fn update(value: impl Into<EntityValue>, previous: impl Into<EntityValue>) -> Self {
        Self::Update {
            value: value.into(),
            previous: previous.into(),
        }
    }

    /// Shorthand for [`Action::Delete`].
    #[must_use]
    pub fn delete(target: EntityRef) -> Self {
        Self::Delete { target }
    }

    /// Whether this is an [`Action::Undo`].
    #[must_use]
    pub const fn is_undo(&self) -> bool {
        matches!(self, Self::Undo)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { value } => write!(f, "create {}", value.entity_ref()),
            Self::Update { value, .. } => write!(f, "update {}", value.entity_ref()),
            Self::Delete { target } => write!(f, "delete {target}"),
            Self::Undo => f.write_str("undo"),
        }
    }
}

/// Implements `From<T> for EntityValue` for each entity struct.
macro_rules! entity_value_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<crate::entities::$variant> for EntityValue {
                fn from(value: crate::entities::$variant) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

entity_value_from!(Node, Member, PointLoad, DistributedLoad, MomentLoad, Support);

/// Collapse undo entries into the effective action sequence.
///
/// The log is walked backwards: every `Undo` cancels the closest earlier action
/// that is not itself an undo. Surviving actions keep their relative order.
///
/// # Examples
/// ```
/// use framex::{resolve_undos, Action, EntityRef};
///
/// let delete = Action::delete(EntityRef::Node("n1".into()));
/// let history = vec![delete.clone(), Action::delete(EntityRef::Node("n2".into())), Action::Undo];
/// assert_eq!(resolve_undos(&history), vec![&delete]);
/// ```
#[must_use]
pub fn resolve_undos(history: &[Action]) -> Vec<&Action> {
    let mut pending_undos = 0_usize;
    let mut effective = Vec::with_capacity(history.len());
    for action in history.iter().rev() {
        if action.is_undo() {
            pending_undos += 1;
        } else if pending_undos > 0 {
            pending_undos -= 1;
        } else {
            effective.push(action);
        }
    }
    effective.reverse();
    effective
}
