//! Turning constraint pairs into coordinates.
//!
//! Resolvers read the already resolved positions of the entities a constraint
//! references through [`PositionLookup`]; they never look further than one level.
//! Inputs are expected to have passed [`is_constraint_pair_valid`] upstream.

use nalgebra::Vector2;

use crate::entities::{
    Attachment, Constraint, ConstraintPair, ConstraintType, DistributedLoad, EntitySet, Member,
    MomentLoad, Node, PointLoad, Support,
};
use crate::errors::ResolveError;
use crate::geometry::{
    intersection_between_lines, intersection_with_x, intersection_with_y, Line, Point,
};

/// Read access to resolved node and member positions.
pub trait PositionLookup {
    /// Resolved position of a node.
    fn node_position(&self, id: &str) -> Option<Point>;
    /// Resolved line of a member.
    fn member_line(&self, id: &str) -> Option<Line>;
}

impl PositionLookup for EntitySet {
    fn node_position(&self, id: &str) -> Option<Point> {
        self.nodes.get(id).map(|node| node.resolved)
    }

    fn member_line(&self, id: &str) -> Option<Line> {
        self.members.get(id).map(|member| member.resolved)
    }
}

/// Classify two constraints as one of the supported pairs.
///
/// The order of the constraints does not matter. Returns `None` for unsupported
/// combinations and when a `Member` constraint lacks its member or an `Angle` or
/// `Distance` constraint lacks its context node.
///
/// # Examples
/// ```
/// use framex::{get_constraint_pair, Constraint, ConstraintPair};
///
/// let pair = get_constraint_pair(&Constraint::y(2.0), &Constraint::member("m1"));
/// assert_eq!(pair, Some(ConstraintPair::MemberY));
/// assert_eq!(get_constraint_pair(&Constraint::x(1.0), &Constraint::x(2.0)), None);
/// ```
#[must_use]
pub fn get_constraint_pair(first: &Constraint, second: &Constraint) -> Option<ConstraintPair> {
    if !has_required_reference(first) || !has_required_reference(second) {
        return None;
    }
    use ConstraintType::{Angle, Distance, Member, X, Y};
    let pair = match (first.kind, second.kind) {
        (X, Y) | (Y, X) => ConstraintPair::XY,
        (Member, X) | (X, Member) => ConstraintPair::MemberX,
        (Member, Y) | (Y, Member) => ConstraintPair::MemberY,
        (Member, Angle) | (Angle, Member) => ConstraintPair::MemberAngle,
        (Angle, X) | (X, Angle) => ConstraintPair::AngleX,
        (Angle, Y) | (Y, Angle) => ConstraintPair::AngleY,
        (Distance, Angle) | (Angle, Distance) => ConstraintPair::DistanceAngle,
        (Member, Member) => ConstraintPair::MemberMember,
        _ => return None,
    };
    Some(pair)
}

/// Whether the constraint names the member or context node its kind needs.
fn has_required_reference(constraint: &Constraint) -> bool {
    let present = |id: &Option<String>| id.as_deref().is_some_and(|id| !id.is_empty());
    match constraint.kind {
        ConstraintType::Member => present(&constraint.member_id),
        ConstraintType::Angle | ConstraintType::Distance => present(&constraint.context_node_id),
        ConstraintType::X | ConstraintType::Y => true,
    }
}

/// Whether a single constraint is complete enough to be used in a pair.
#[must_use]
pub fn is_constraint_valid(constraint: &Constraint) -> bool {
    constraint.value.is_finite() && has_required_reference(constraint)
}

/// Whether two constraints can position an entity.
///
/// On top of [`get_constraint_pair`] this requires finite values, a shared
/// context node for `DistanceAngle` and two distinct members for `MemberMember`.
#[must_use]
pub fn is_constraint_pair_valid(first: &Constraint, second: &Constraint) -> bool {
    if !is_constraint_valid(first) || !is_constraint_valid(second) {
        return false;
    }
    match get_constraint_pair(first, second) {
        Some(ConstraintPair::DistanceAngle) => first.context_node_id == second.context_node_id,
        Some(ConstraintPair::MemberMember) => first.member_id != second.member_id,
        Some(_) => true,
        None => false,
    }
}

/// Resolve a constraint pair into a position.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidConstraintPair`] for unsupported pairs,
/// [`ResolveError::MissingNode`] or [`ResolveError::MissingMember`] when a
/// referenced entity is unknown to `lookup`, and [`ResolveError::NoIntersection`]
/// when the construction lines are parallel.
pub fn resolve_constraint_pair(
    first: &Constraint,
    second: &Constraint,
    lookup: &impl PositionLookup,
) -> Result<Point, ResolveError> {
    let pair = get_constraint_pair(first, second).ok_or(ResolveError::InvalidConstraintPair {
        first: first.kind,
        second: second.kind,
    })?;
    let no_intersection = || ResolveError::NoIntersection(pair.name());
    match pair {
        ConstraintPair::XY => {
            let (x, y) = split(first, second, ConstraintType::X);
            Ok(Point::new(x.value, y.value))
        }
        ConstraintPair::MemberX => {
            let (member, x) = split(first, second, ConstraintType::Member);
            let line = member_line(member, lookup)?;
            let y = intersection_with_x(&line, x.value).ok_or_else(no_intersection)?;
            Ok(Point::new(x.value, y))
        }
        ConstraintPair::MemberY => {
            let (member, y) = split(first, second, ConstraintType::Member);
            let line = member_line(member, lookup)?;
            let x = intersection_with_y(&line, y.value).ok_or_else(no_intersection)?;
            Ok(Point::new(x, y.value))
        }
        ConstraintPair::MemberAngle => {
            let (member, angle) = split(first, second, ConstraintType::Member);
            let line = member_line(member, lookup)?;
            let ray = angle_ray(angle, lookup)?;
            intersection_between_lines(&line, &ray).ok_or_else(no_intersection)
        }
        ConstraintPair::AngleX => {
            let (angle, x) = split(first, second, ConstraintType::Angle);
            let ray = angle_ray(angle, lookup)?;
            let y = intersection_with_x(&ray, x.value).ok_or_else(no_intersection)?;
            Ok(Point::new(x.value, y))
        }
        ConstraintPair::AngleY => {
            let (angle, y) = split(first, second, ConstraintType::Angle);
            let ray = angle_ray(angle, lookup)?;
            let x = intersection_with_y(&ray, y.value).ok_or_else(no_intersection)?;
            Ok(Point::new(x, y.value))
        }
        ConstraintPair::DistanceAngle => {
            let (distance, angle) = split(first, second, ConstraintType::Distance);
            let anchor = context_position(distance, lookup)?;
            Ok(Point::from(
                anchor.to_vector() + unit_direction(angle.value) * distance.value,
            ))
        }
        ConstraintPair::MemberMember => {
            let first_line = member_line(first, lookup)?;
            let second_line = member_line(second, lookup)?;
            intersection_between_lines(&first_line, &second_line).ok_or_else(no_intersection)
        }
    }
}

/// Order two constraints so that the one of `kind` comes first.
fn split<'a>(
    first: &'a Constraint,
    second: &'a Constraint,
    kind: ConstraintType,
) -> (&'a Constraint, &'a Constraint) {
    if first.kind == kind {
        (first, second)
    } else {
        (second, first)
    }
}

/// Resolved line of the member named by a `Member` constraint.
fn member_line(constraint: &Constraint, lookup: &impl PositionLookup) -> Result<Line, ResolveError> {
    let id = constraint.member_id.as_deref().unwrap_or_default();
    lookup
        .member_line(id)
        .ok_or_else(|| ResolveError::MissingMember(id.to_string()))
}

/// Resolved position of the context node of an `Angle` or `Distance` constraint.
fn context_position(
    constraint: &Constraint,
    lookup: &impl PositionLookup,
) -> Result<Point, ResolveError> {
    let id = constraint.context_node_id.as_deref().unwrap_or_default();
    node_position(id, lookup)
}

/// Resolved position of a node.
fn node_position(id: &str, lookup: &impl PositionLookup) -> Result<Point, ResolveError> {
    lookup
        .node_position(id)
        .ok_or_else(|| ResolveError::MissingNode(id.to_string()))
}

/// Unit vector at `degrees` from the X axis, counter-clockwise.
fn unit_direction(degrees: f64) -> Vector2<f64> {
    let radians = degrees.to_radians();
    Vector2::new(radians.cos(), radians.sin())
}

/// Unit-length ray leaving the context node of an `Angle` constraint.
fn angle_ray(angle: &Constraint, lookup: &impl PositionLookup) -> Result<Line, ResolveError> {
    let anchor = context_position(angle, lookup)?;
    let tip = Point::from(anchor.to_vector() + unit_direction(angle.value));
    Ok(Line::new(anchor, tip))
}

/// Resolve the position of a node from its two constraints.
///
/// # Errors
///
/// See [`resolve_constraint_pair`].
pub fn resolve_node_position(
    node: &Node,
    lookup: &impl PositionLookup,
) -> Result<Point, ResolveError> {
    resolve_constraint_pair(&node.constraint1, &node.constraint2, lookup)
}

/// Resolve a member as the line between its end nodes.
///
/// # Errors
///
/// Returns [`ResolveError::MissingNode`] when an end node is unknown.
pub fn resolve_member_position(
    member: &Member,
    lookup: &impl PositionLookup,
) -> Result<Line, ResolveError> {
    Ok(Line::new(
        node_position(&member.node1.id, lookup)?,
        node_position(&member.node2.id, lookup)?,
    ))
}

/// Resolve a node or member attachment.
///
/// A member attachment is the pair made of a `Member` constraint on the host and
/// the attachment's own constraint.
///
/// # Errors
///
/// See [`resolve_constraint_pair`].
pub fn resolve_attachment(
    attachment: &Attachment,
    lookup: &impl PositionLookup,
) -> Result<Point, ResolveError> {
    match attachment {
        Attachment::OnNode { id } => node_position(id, lookup),
        Attachment::OnMember { id, constraint } => {
            resolve_on_member(id, constraint, lookup)
        }
    }
}

/// Resolve a point on `member_id` completed by `constraint`.
fn resolve_on_member(
    member_id: &str,
    constraint: &Constraint,
    lookup: &impl PositionLookup,
) -> Result<Point, ResolveError> {
    resolve_constraint_pair(&Constraint::member(member_id), constraint, lookup)
}

/// Resolve the point of application of a point load.
///
/// # Errors
///
/// See [`resolve_attachment`].
pub fn resolve_point_load_position(
    load: &PointLoad,
    lookup: &impl PositionLookup,
) -> Result<Point, ResolveError> {
    resolve_attachment(&load.attachment, lookup)
}

/// Resolve the point of application of a moment.
///
/// # Errors
///
/// See [`resolve_attachment`].
pub fn resolve_moment_load_position(
    load: &MomentLoad,
    lookup: &impl PositionLookup,
) -> Result<Point, ResolveError> {
    resolve_attachment(&load.attachment, lookup)
}

/// Resolve the location of a support.
///
/// # Errors
///
/// See [`resolve_attachment`].
pub fn resolve_support_position(
    support: &Support,
    lookup: &impl PositionLookup,
) -> Result<Point, ResolveError> {
    resolve_attachment(&support.attachment, lookup)
}

/// Resolve the loaded segment of a distributed load.
///
/// # Errors
///
/// See [`resolve_constraint_pair`].
pub fn resolve_distributed_load_position(
    load: &DistributedLoad,
    lookup: &impl PositionLookup,
) -> Result<Line, ResolveError> {
    let span = &load.on_member;
    Ok(Line::new(
        resolve_on_member(&span.id, &span.constraint_start, lookup)?,
        resolve_on_member(&span.id, &span.constraint_end, lookup)?,
    ))
}
