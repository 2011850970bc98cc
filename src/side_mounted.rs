//! Nodes and loads riding along the span of a member.
//!
//! A side-mounted node is positioned on a member's line through a `Member`
//! constraint instead of being one of the member's ends. When the host member
//! moves or shrinks, such entities may end up outside its span; they are then
//! flagged for the user rather than silently relocated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ReduceConfig;
use crate::entities::{Attachment, EntityRef, EntitySet, Member, Node};
use crate::errors::ResolveError;
use crate::geometry::{
    above_or_below_line, intersection_with_x, intersection_with_y, normalized_orthogonal_vector,
    point_on_line, slope, unclamped_position_on_line, Line, Point,
};
use crate::resolve::PositionLookup;

/// Attention reason for a node left outside its host member.
pub const NODE_OUTSIDE_MEMBER: &str = "Knuden ligger uden for det tilknyttede konstruktionselement";
/// Attention reason for a load left outside its host member.
pub const LOAD_OUTSIDE_MEMBER: &str = "Lasten ligger uden for det tilknyttede konstruktionselement";

/// Rejection for a Y coordinate on a near-horizontal member.
const Y_ON_HORIZONTAL_MEMBER: &str =
    "Y-koordinaten kan ikke angives for en knude på et vandret konstruktionselement";
/// Rejection for an X coordinate on a near-vertical member.
const X_ON_VERTICAL_MEMBER: &str =
    "X-koordinaten kan ikke angives for en knude på et lodret konstruktionselement";
/// Reason for a coordinate beyond the member ends.
const OUTSIDE_MEMBER: &str = "Koordinaten ligger uden for konstruktionselementet";

/// The single member a node is mounted on, if it depends on exactly one.
#[must_use]
pub fn host_member(node: &Node) -> Option<&str> {
    let mut hosts = node.host_members();
    let host = hosts.next()?;
    match hosts.next() {
        Some(other) if other != host => None,
        _ => Some(host),
    }
}

/// Which side of `host` the members leaving `node` lie on.
///
/// `Some(0.0)` when no member leaves the node, `None` when they disagree.
fn side_of_dependent_members(node: &Node, host: &Line, set: &EntitySet) -> Option<f64> {
    let mut sides = set
        .members
        .values()
        .filter(|member| member.has_end(&node.id))
        .map(|member| side_sign(above_or_below_line(host, member.far_end_from(&node.id))));
    let Some(first) = sides.next() else {
        return Some(0.0);
    };
    sides.all(|side| side == first).then_some(first)
}

/// Magnitude of [`above_or_below_line`] under which a point counts as on the line.
const ON_LINE_TOLERANCE: f64 = 1.0e-12;

/// Side of a line as -1, 0 or 1.
fn side_sign(value: f64) -> f64 {
    if value.abs() < ON_LINE_TOLERANCE {
        0.0
    } else {
        value.signum()
    }
}

/// Whether the node rides on the side of a single member.
///
/// A node qualifies when it depends on exactly one member and every member
/// that uses it as an end lies on the same side of that host member. A node no
/// member uses yet qualifies trivially.
#[must_use]
pub fn is_side_mounted_node(node_id: &str, set: &EntitySet) -> bool {
    let Some(node) = set.nodes.get(node_id) else {
        return false;
    };
    let Some(host) = host_member(node).and_then(|id| set.member_line(id)) else {
        return false;
    };
    side_of_dependent_members(node, &host, set).is_some()
}

/// Rendering positions of side-mounted nodes.
///
/// Each side-mounted node with at least one member attached is pushed `size`
/// away from its host member toward the side its members are on. Nodes that
/// stay on the member line are not part of the result. The snapshot itself is
/// not modified.
#[must_use]
pub fn process_side_mounted_nodes(set: &EntitySet, size: f64) -> BTreeMap<String, Point> {
    let mut offsets = BTreeMap::new();
    for node in set.nodes.values() {
        let Some(host) = host_member(node).and_then(|id| set.member_line(id)) else {
            continue;
        };
        let Some(side) = side_of_dependent_members(node, &host, set) else {
            continue;
        };
        if side == 0.0 {
            continue;
        }
        if let Some(normal) = normalized_orthogonal_vector(&host, side) {
            let shifted = Point::from(node.resolved.to_vector() + normal * size);
            offsets.insert(node.id.clone(), shifted);
        }
    }
    offsets
}

/// Line of a member as drawn once side-mounted ends are offset.
#[must_use]
pub fn rendered_member_line(member: &Member, offsets: &BTreeMap<String, Point>) -> Line {
    let end = |id: &str, resolved: Point| offsets.get(id).copied().unwrap_or(resolved);
    Line::new(
        end(&member.node1.id, member.resolved.point1),
        end(&member.node2.id, member.resolved.point2),
    )
}

/// An entity that has to be flagged for the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttentionUpdate {
    /// Entity to flag.
    pub entity: EntityRef,
    /// Reason shown to the user.
    pub reason: &'static str,
}

/// Find entities bound to `member_id` that fall outside the member after it moved.
///
/// The span is the X range of the member when it is closer to horizontal than
/// vertical, otherwise its Y range. Side-mounted nodes, member-attached point
/// loads and member-attached moment loads are checked. Nothing is reported when
/// the member did not move.
#[must_use]
pub fn check_side_mounted_node_bounds(
    member_id: &str,
    previous: &Line,
    resolved: &Line,
    set: &EntitySet,
    config: &ReduceConfig,
) -> Vec<AttentionUpdate> {
    if previous == resolved {
        return Vec::new();
    }
    let outside = |position: Point| !within_span(resolved, position, config.bounds_epsilon);
    let mut updates = Vec::new();

    for node in set.nodes.values() {
        if host_member(node) == Some(member_id)
            && is_side_mounted_node(&node.id, set)
            && outside(node.resolved)
        {
            updates.push(AttentionUpdate {
                entity: EntityRef::Node(node.id.clone()),
                reason: NODE_OUTSIDE_MEMBER,
            });
        }
    }
    let on_member = |attachment: &Attachment| attachment.member_id() == Some(member_id);
    for load in set.point_loads.values() {
        if on_member(&load.attachment) && outside(load.resolved) {
            updates.push(AttentionUpdate {
                entity: EntityRef::PointLoad(load.id.clone()),
                reason: LOAD_OUTSIDE_MEMBER,
            });
        }
    }
    for load in set.moment_loads.values() {
        if on_member(&load.attachment) && outside(load.resolved) {
            updates.push(AttentionUpdate {
                entity: EntityRef::MomentLoad(load.id.clone()),
                reason: LOAD_OUTSIDE_MEMBER,
            });
        }
    }
    updates
}

/// Whether `position` lies within the X or Y range of `member`, whichever is longer.
fn within_span(member: &Line, position: Point, epsilon: f64) -> bool {
    let dx = (member.point2.x - member.point1.x).abs();
    let dy = (member.point2.y - member.point1.y).abs();
    let (value, a, b) = if dx >= dy {
        (position.x, member.point1.x, member.point2.x)
    } else {
        (position.y, member.point1.y, member.point2.y)
    };
    value >= a.min(b) - epsilon && value <= a.max(b) + epsilon
}

/// Coordinate a user edits on a side-mounted node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    /// Horizontal coordinate.
    X,
    /// Vertical coordinate.
    Y,
}

/// Outcome of [`validate_side_mounted_node_constraint`].
#[derive(Clone, Debug, PartialEq)]
pub enum SideMountValidation {
    /// The coordinate places the node within the member.
    Valid,
    /// The coordinate cannot position a node on a member of this orientation.
    Rejected {
        /// Message for the user.
        reason: &'static str,
    },
    /// The coordinate lies beyond an end of the member.
    OutOfBounds {
        /// Nearest coordinate that keeps the node on the member.
        corrected_value: f64,
        /// Message for the user.
        reason: &'static str,
    },
}

impl SideMountValidation {
    /// Whether the value can be applied as-is.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Check a coordinate typed for a node mounted on `member_id`.
///
/// Setting Y on a near-horizontal member or X on a near-vertical one is
/// rejected. Otherwise the node's position along the member is computed without
/// clamping; positions beyond either end come back with a clamped suggestion.
///
/// # Errors
///
/// Returns [`ResolveError::MissingMember`] when the member is unknown.
///
/// # Examples
/// ```
/// use framex::side_mounted::{validate_side_mounted_node_constraint, Axis, SideMountValidation};
/// use framex::{reduce_history, Action, Member, Node, ReduceConfig};
///
/// let set = reduce_history(&[
///     Action::create(Node::fixed("n1", 0.0, 0.0)),
///     Action::create(Node::fixed("n2", 10.0, 0.0)),
///     Action::create(Member::new("m1", "n1", "n2")),
/// ])
/// .unwrap();
/// let config = ReduceConfig::default();
/// let check = validate_side_mounted_node_constraint("m1", Axis::X, 12.0, &set, &config).unwrap();
/// assert!(matches!(check, SideMountValidation::OutOfBounds { corrected_value, .. } if corrected_value == 10.0));
/// ```
pub fn validate_side_mounted_node_constraint(
    member_id: &str,
    axis: Axis,
    value: f64,
    set: &EntitySet,
    config: &ReduceConfig,
) -> Result<SideMountValidation, ResolveError> {
    let line = set
        .member_line(member_id)
        .ok_or_else(|| ResolveError::MissingMember(member_id.to_string()))?;
    let steepness = slope(&line).abs();
    let position = match axis {
        Axis::Y if steepness < config.horizontal_slope_threshold => {
            return Ok(SideMountValidation::Rejected {
                reason: Y_ON_HORIZONTAL_MEMBER,
            });
        }
        Axis::X if steepness > config.vertical_slope_threshold => {
            return Ok(SideMountValidation::Rejected {
                reason: X_ON_VERTICAL_MEMBER,
            });
        }
        Axis::X => {
            let y = intersection_with_x(&line, value)
                .ok_or(ResolveError::NoIntersection("MemberX"))?;
            Point::new(value, y)
        }
        Axis::Y => {
            let x = intersection_with_y(&line, value)
                .ok_or(ResolveError::NoIntersection("MemberY"))?;
            Point::new(x, value)
        }
    };
    let t = unclamped_position_on_line(&line, position);
    if (0.0..=1.0).contains(&t) {
        return Ok(SideMountValidation::Valid);
    }
    let clamped = point_on_line(&line, t.clamp(0.0, 1.0));
    let corrected_value = match axis {
        Axis::X => clamped.x,
        Axis::Y => clamped.y,
    };
    Ok(SideMountValidation::OutOfBounds {
        corrected_value,
        reason: OUTSIDE_MEMBER,
    })
}
