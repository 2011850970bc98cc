#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_doc_code_examples)]
#![warn(clippy::missing_docs_in_private_items)]
#![doc = include_str!("../README.md")]

pub mod config;
pub mod entities;
pub mod errors;
pub mod geometry;
pub mod graph;
pub mod history;
pub mod reducer;
pub mod resolve;
pub mod side_mounted;

pub use config::ReduceConfig;
pub use entities::{
    Assembly, Attachment, Constraint, ConstraintPair, ConstraintType, DistributedLoad, EntityKind,
    EntityRef, EntitySet, EntityValue, Member, MemberEnd, MemberSpan, MomentLoad, Node,
    NodeDefinition, PointLoad, Support, SupportType,
};
pub use errors::{ActionError, GraphError, IdError, ReduceError, ResolveError};
pub use geometry::{line, point, Line, Point};
pub use graph::DependencyGraph;
pub use history::{resolve_undos, Action};
pub use reducer::{reduce_history, reduce_history_with, ReductionState};
pub use resolve::{get_constraint_pair, is_constraint_pair_valid, PositionLookup};
pub use side_mounted::{
    is_side_mounted_node, process_side_mounted_nodes, validate_side_mounted_node_constraint,
    SideMountValidation,
};
