//! Entity model of a parametric frame: constraints, nodes, members, loads and supports.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::IdError;
use crate::geometry::{Line, Point};

/// What a single [`Constraint`] pins down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintType {
    /// Absolute X coordinate.
    X,
    /// Absolute Y coordinate.
    Y,
    /// Lies on the line of a member.
    Member,
    /// Lies on a ray leaving a context node at an angle in degrees.
    Angle,
    /// Lies at a distance from a context node.
    Distance,
}

/// One half of the pair that positions a node or a member attachment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    /// Kind of constraint.
    #[serde(rename = "type")]
    pub kind: ConstraintType,
    /// Coordinate, angle in degrees or distance depending on `kind`.
    #[serde(default)]
    pub value: f64,
    /// Node anchoring an `Angle` or `Distance` constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_node_id: Option<String>,
    /// Member referenced by a `Member` constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
}

impl Constraint {
    /// Constraint fixing the X coordinate.
    #[must_use]
    pub const fn x(value: f64) -> Self {
        Self {
            kind: ConstraintType::X,
            value,
            context_node_id: None,
            member_id: None,
        }
    }

    /// Constraint fixing the Y coordinate.
    #[must_use]
    pub const fn y(value: f64) -> Self {
        Self {
            kind: ConstraintType::Y,
            value,
            context_node_id: None,
            member_id: None,
        }
    }

    /// Constraint placing the entity on the line of `member_id`.
    #[must_use]
    pub fn member(member_id: impl Into<String>) -> Self {
        Self {
            kind: ConstraintType::Member,
            value: 0.0,
            context_node_id: None,
            member_id: Some(member_id.into()),
        }
    }

    /// Constraint placing the entity on a ray from `context_node_id` at `degrees`.
    #[must_use]
    pub fn angle(degrees: f64, context_node_id: impl Into<String>) -> Self {
        Self {
            kind: ConstraintType::Angle,
            value: degrees,
            context_node_id: Some(context_node_id.into()),
            member_id: None,
        }
    }

    /// Constraint placing the entity at `distance` from `context_node_id`.
    #[must_use]
    pub fn distance(distance: f64, context_node_id: impl Into<String>) -> Self {
        Self {
            kind: ConstraintType::Distance,
            value: distance,
            context_node_id: Some(context_node_id.into()),
            member_id: None,
        }
    }

    /// Entities whose resolved state this constraint reads.
    pub fn references(&self) -> impl Iterator<Item = EntityRef> + '_ {
        let member = self
            .member_id
            .iter()
            .filter(move |_| self.kind == ConstraintType::Member)
            .map(|id| EntityRef::Member(id.clone()));
        let context = self
            .context_node_id
            .iter()
            .filter(move |_| matches!(self.kind, ConstraintType::Angle | ConstraintType::Distance))
            .map(|id| EntityRef::Node(id.clone()));
        member.chain(context)
    }
}

/// The supported combinations of two constraint types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintPair {
    /// Absolute X and Y.
    XY,
    /// Member line and absolute X.
    MemberX,
    /// Member line and absolute Y.
    MemberY,
    /// Member line and an angle ray.
    MemberAngle,
    /// Angle ray and absolute X.
    AngleX,
    /// Angle ray and absolute Y.
    AngleY,
    /// Polar offset from a context node.
    DistanceAngle,
    /// Crossing of two member lines.
    MemberMember,
}

impl ConstraintPair {
    /// Name used in messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::XY => "XY",
            Self::MemberX => "MemberX",
            Self::MemberY => "MemberY",
            Self::MemberAngle => "MemberAngle",
            Self::AngleX => "AngleX",
            Self::AngleY => "AngleY",
            Self::DistanceAngle => "DistanceAngle",
            Self::MemberMember => "MemberMember",
        }
    }
}

impl fmt::Display for ConstraintPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a member is connected at a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Assembly {
    /// Moment-free connection.
    #[default]
    Hinge,
    /// Moment-resisting connection.
    Stiff,
}

/// A point of the frame, positioned by two constraints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier, prefixed with `n`.
    pub id: String,
    /// First positioning constraint.
    pub constraint1: Constraint,
    /// Second positioning constraint.
    pub constraint2: Constraint,
    /// Connection type, mirrored onto adjacent members.
    ///
    /// Left out of an update payload, the stored value is kept; a new node
    /// without one becomes a [`Assembly::Hinge`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembly: Option<Assembly>,
    /// Position derived from the constraints.
    #[serde(default)]
    pub resolved: Point,
    /// Identifiers of entities that directly depend on this node.
    #[serde(default)]
    pub dependants: Vec<String>,
    /// Set when the node no longer lies within the member it is mounted on.
    #[serde(default)]
    pub needs_attention: bool,
    /// Explanation shown alongside `needs_attention`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attention_reason: Option<String>,
}

impl Node {
    /// Create an unresolved hinge node.
    #[must_use]
    pub fn new(id: impl Into<String>, constraint1: Constraint, constraint2: Constraint) -> Self {
        Self {
            id: id.into(),
            constraint1,
            constraint2,
            assembly: None,
            resolved: Point::default(),
            dependants: Vec::new(),
            needs_attention: false,
            attention_reason: None,
        }
    }

    /// Create a node fixed at absolute coordinates.
    #[must_use]
    pub fn fixed(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self::new(id, Constraint::x(x), Constraint::y(y))
    }

    /// Replace the connection type.
    #[must_use]
    pub fn with_assembly(mut self, assembly: Assembly) -> Self {
        self.assembly = Some(assembly);
        self
    }

    /// Connection type, [`Assembly::Hinge`] when none was given.
    #[must_use]
    pub fn assembly(&self) -> Assembly {
        self.assembly.unwrap_or_default()
    }

    /// Both constraints, in declaration order.
    #[must_use]
    pub fn constraints(&self) -> [&Constraint; 2] {
        [&self.constraint1, &self.constraint2]
    }

    /// Identifiers of the members this node is positioned on.
    pub fn host_members(&self) -> impl Iterator<Item = &str> {
        self.constraints()
            .into_iter()
            .filter(|constraint| constraint.kind == ConstraintType::Member)
            .filter_map(|constraint| constraint.member_id.as_deref())
    }
}

/// Constraints for a node created together with a member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDefinition {
    /// First positioning constraint.
    pub constraint1: Constraint,
    /// Second positioning constraint.
    pub constraint2: Constraint,
}

/// Reference from a member to one of its end nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberEnd {
    /// Identifier of the end node.
    pub id: String,
    /// Connection type at this end, mirrored from the node.
    #[serde(default)]
    pub assembly: Assembly,
    /// Inline definition used to create the node together with the member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<NodeDefinition>,
}

impl MemberEnd {
    /// Reference an existing node.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            assembly: Assembly::Hinge,
            definition: None,
        }
    }

    /// Reference a node that is created with the member when missing.
    #[must_use]
    pub fn defined(id: impl Into<String>, constraint1: Constraint, constraint2: Constraint) -> Self {
        Self {
            definition: Some(NodeDefinition {
                constraint1,
                constraint2,
            }),
            ..Self::new(id)
        }
    }
}

/// A straight structural element between two nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Unique identifier, prefixed with `m`.
    pub id: String,
    /// Start node.
    pub node1: MemberEnd,
    /// End node.
    pub node2: MemberEnd,
    /// Section and material data, carried through untouched.
    #[serde(default, rename = "memberprop")]
    pub member_prop: serde_json::Value,
    /// Line between the resolved positions of both nodes.
    #[serde(default)]
    pub resolved: Line,
    /// Identifiers of entities that directly depend on this member.
    #[serde(default)]
    pub dependants: Vec<String>,
}

impl Member {
    /// Create an unresolved member between two existing nodes.
    #[must_use]
    pub fn new(id: impl Into<String>, node1: impl Into<String>, node2: impl Into<String>) -> Self {
        Self::between(id, MemberEnd::new(node1), MemberEnd::new(node2))
    }

    /// Create an unresolved member from explicit end references.
    #[must_use]
    pub fn between(id: impl Into<String>, node1: MemberEnd, node2: MemberEnd) -> Self {
        Self {
            id: id.into(),
            node1,
            node2,
            member_prop: serde_json::Value::Null,
            resolved: Line::default(),
            dependants: Vec::new(),
        }
    }

    /// Identifiers of both end nodes.
    #[must_use]
    pub fn node_ids(&self) -> [&str; 2] {
        [self.node1.id.as_str(), self.node2.id.as_str()]
    }

    /// Whether `node_id` is one of the ends.
    #[must_use]
    pub fn has_end(&self, node_id: &str) -> bool {
        self.node1.id == node_id || self.node2.id == node_id
    }

    /// Resolved position of the end opposite to `node_id`.
    #[must_use]
    pub fn far_end_from(&self, node_id: &str) -> Point {
        if self.node1.id == node_id {
            self.resolved.point2
        } else {
            self.resolved.point1
        }
    }
}

/// Where a point-like load or support is placed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Attachment {
    /// Sits on a node.
    #[serde(rename = "onNode")]
    OnNode {
        /// Identifier of the node.
        id: String,
    },
    /// Sits on a member, positioned along it by one extra constraint.
    #[serde(rename = "onMember")]
    OnMember {
        /// Identifier of the member.
        id: String,
        /// Constraint completing the member constraint.
        constraint: Constraint,
    },
}

impl Attachment {
    /// Attach to a node.
    #[must_use]
    pub fn node(id: impl Into<String>) -> Self {
        Self::OnNode { id: id.into() }
    }

    /// Attach to a member at the position given by `constraint`.
    #[must_use]
    pub fn member(id: impl Into<String>, constraint: Constraint) -> Self {
        Self::OnMember {
            id: id.into(),
            constraint,
        }
    }

    /// Identifier of the host member, when attached to one.
    #[must_use]
    pub fn member_id(&self) -> Option<&str> {
        match self {
            Self::OnMember { id, .. } => Some(id),
            Self::OnNode { .. } => None,
        }
    }

    /// Entities the placement reads.
    fn references(&self) -> Vec<EntityRef> {
        match self {
            Self::OnNode { id } => vec![EntityRef::Node(id.clone())],
            Self::OnMember { id, constraint } => std::iter::once(EntityRef::Member(id.clone()))
                .chain(constraint.references())
                .collect(),
        }
    }
}

/// Concentrated force.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointLoad {
    /// Unique identifier, prefixed with `pl`.
    pub id: String,
    /// Placement of the load. Serialized inline as `onNode` or `onMember`.
    #[serde(flatten)]
    pub attachment: Attachment,
    /// Force in kilonewtons.
    #[serde(default)]
    pub magnitude: f64,
    /// Direction of the force in degrees.
    #[serde(default)]
    pub angle: f64,
    /// Point of application.
    #[serde(default)]
    pub resolved: Point,
    /// Set when the load no longer lies within its member.
    #[serde(default)]
    pub needs_attention: bool,
    /// Explanation shown alongside `needs_attention`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attention_reason: Option<String>,
}

impl PointLoad {
    /// Create an unresolved load.
    #[must_use]
    pub fn new(id: impl Into<String>, attachment: Attachment, magnitude: f64) -> Self {
        Self {
            id: id.into(),
            attachment,
            magnitude,
            angle: -90.0,
            resolved: Point::default(),
            needs_attention: false,
            attention_reason: None,
        }
    }
}

/// Span of a member covered by a distributed load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSpan {
    /// Identifier of the member.
    pub id: String,
    /// Constraint positioning the start of the load.
    pub constraint_start: Constraint,
    /// Constraint positioning the end of the load.
    pub constraint_end: Constraint,
}

/// Line load along part of a member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributedLoad {
    /// Unique identifier, prefixed with `dl`.
    pub id: String,
    /// Loaded span.
    pub on_member: MemberSpan,
    /// Intensity at the start in kilonewtons per metre.
    #[serde(default)]
    pub magnitude1: f64,
    /// Intensity at the end in kilonewtons per metre.
    #[serde(default)]
    pub magnitude2: f64,
    /// Direction of the load in degrees.
    #[serde(default)]
    pub angle: f64,
    /// Loaded segment.
    #[serde(default)]
    pub resolved: Line,
    /// Set when the load needs to be re-pinned by the user.
    #[serde(default)]
    pub needs_attention: bool,
    /// Explanation shown alongside `needs_attention`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attention_reason: Option<String>,
}

impl DistributedLoad {
    /// Create an unresolved uniform load.
    #[must_use]
    pub fn new(id: impl Into<String>, on_member: MemberSpan, magnitude: f64) -> Self {
        Self {
            id: id.into(),
            on_member,
            magnitude1: magnitude,
            magnitude2: magnitude,
            angle: -90.0,
            resolved: Line::default(),
            needs_attention: false,
            attention_reason: None,
        }
    }
}

/// Concentrated moment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MomentLoad {
    /// Unique identifier, prefixed with `ml`.
    pub id: String,
    /// Placement of the moment. Serialized inline as `onNode` or `onMember`.
    #[serde(flatten)]
    pub attachment: Attachment,
    /// Moment in kilonewton metres, counter-clockwise positive.
    #[serde(default)]
    pub magnitude: f64,
    /// Point of application.
    #[serde(default)]
    pub resolved: Point,
    /// Set when the moment no longer lies within its member.
    #[serde(default)]
    pub needs_attention: bool,
    /// Explanation shown alongside `needs_attention`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attention_reason: Option<String>,
}

impl MomentLoad {
    /// Create an unresolved moment.
    #[must_use]
    pub fn new(id: impl Into<String>, attachment: Attachment, magnitude: f64) -> Self {
        Self {
            id: id.into(),
            attachment,
            magnitude,
            resolved: Point::default(),
            needs_attention: false,
            attention_reason: None,
        }
    }
}

/// Restraint type of a support.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupportType {
    /// Restrains both translations and rotation.
    Fixed,
    /// Restrains both translations.
    #[default]
    Pinned,
    /// Restrains translation normal to its angle.
    Roller,
}

/// Boundary condition of the frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Support {
    /// Unique identifier, prefixed with `s`.
    pub id: String,
    /// Placement of the support. Serialized inline as `onNode` or `onMember`.
    #[serde(flatten)]
    pub attachment: Attachment,
    /// Restraint type.
    #[serde(default, rename = "type")]
    pub kind: SupportType,
    /// Orientation in degrees.
    #[serde(default)]
    pub angle: f64,
    /// Point of support.
    #[serde(default)]
    pub resolved: Point,
    /// Set when the support needs to be re-pinned by the user.
    #[serde(default)]
    pub needs_attention: bool,
    /// Explanation shown alongside `needs_attention`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attention_reason: Option<String>,
}

impl Support {
    /// Create an unresolved support.
    #[must_use]
    pub fn new(id: impl Into<String>, attachment: Attachment, kind: SupportType) -> Self {
        Self {
            id: id.into(),
            attachment,
            kind,
            angle: 0.0,
            resolved: Point::default(),
            needs_attention: false,
            attention_reason: None,
        }
    }
}

/// The six entity families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    /// [`Node`]
    Node,
    /// [`Member`]
    Member,
    /// [`PointLoad`]
    PointLoad,
    /// [`DistributedLoad`]
    DistributedLoad,
    /// [`MomentLoad`]
    MomentLoad,
    /// [`Support`]
    Support,
}

impl EntityKind {
    /// Identifier prefix of the kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Node => "n",
            Self::Member => "m",
            Self::PointLoad => "pl",
            Self::DistributedLoad => "dl",
            Self::MomentLoad => "ml",
            Self::Support => "s",
        }
    }

    /// Whether the kind is a load or moment.
    #[must_use]
    pub const fn is_load(self) -> bool {
        matches!(self, Self::PointLoad | Self::DistributedLoad | Self::MomentLoad)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Node => "node",
            Self::Member => "member",
            Self::PointLoad => "point load",
            Self::DistributedLoad => "distributed load",
            Self::MomentLoad => "moment load",
            Self::Support => "support",
        };
        f.write_str(name)
    }
}

/// Identifier tagged with the kind of entity it names.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "entity", content = "id")]
pub enum EntityRef {
    /// A node.
    Node(String),
    /// A member.
    Member(String),
    /// A point load.
    PointLoad(String),
    /// A distributed load.
    DistributedLoad(String),
    /// A moment load.
    MomentLoad(String),
    /// A support.
    Support(String),
}

impl EntityRef {
    /// Tag `id` with `kind` without looking at the identifier.
    #[must_use]
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        let id = id.into();
        match kind {
            EntityKind::Node => Self::Node(id),
            EntityKind::Member => Self::Member(id),
            EntityKind::PointLoad => Self::PointLoad(id),
            EntityKind::DistributedLoad => Self::DistributedLoad(id),
            EntityKind::MomentLoad => Self::MomentLoad(id),
            EntityKind::Support => Self::Support(id),
        }
    }

    /// Derive the kind from the identifier prefix.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::UnknownPrefix`] when no kind uses the prefix.
    ///
    /// # Examples
    /// ```
    /// use framex::{EntityKind, EntityRef};
    ///
    /// assert_eq!(EntityRef::from_id("ml3").unwrap().kind(), EntityKind::MomentLoad);
    /// assert_eq!(EntityRef::from_id("m3").unwrap().kind(), EntityKind::Member);
    /// ```
    pub fn from_id(id: &str) -> Result<Self, IdError> {
        // two-letter prefixes first: "ml" would otherwise read as a member
        let kind = [
            EntityKind::PointLoad,
            EntityKind::DistributedLoad,
            EntityKind::MomentLoad,
            EntityKind::Node,
            EntityKind::Member,
            EntityKind::Support,
        ]
        .into_iter()
        .find(|kind| id.starts_with(kind.prefix()))
        .ok_or_else(|| IdError::UnknownPrefix(id.to_string()))?;
        Ok(Self::new(kind, id))
    }

    /// Tag `id` with `kind`, checking that its prefix agrees.
    ///
    /// # Errors
    ///
    /// Returns [`IdError`] when the prefix is unknown or names another kind.
    pub fn checked(kind: EntityKind, id: &str) -> Result<Self, IdError> {
        let parsed = Self::from_id(id)?;
        if parsed.kind() == kind {
            Ok(parsed)
        } else {
            Err(IdError::KindMismatch {
                id: id.to_string(),
                expected: kind,
            })
        }
    }

    /// Kind of the referenced entity.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Node(_) => EntityKind::Node,
            Self::Member(_) => EntityKind::Member,
            Self::PointLoad(_) => EntityKind::PointLoad,
            Self::DistributedLoad(_) => EntityKind::DistributedLoad,
            Self::MomentLoad(_) => EntityKind::MomentLoad,
            Self::Support(_) => EntityKind::Support,
        }
    }

    /// Raw identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Node(id)
            | Self::Member(id)
            | Self::PointLoad(id)
            | Self::DistributedLoad(id)
            | Self::MomentLoad(id)
            | Self::Support(id) => id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind(), self.id())
    }
}

/// Payload of a create or update action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity")]
pub enum EntityValue {
    /// A node.
    Node(Node),
    /// A member.
    Member(Member),
    /// A point load.
    PointLoad(PointLoad),
    /// A distributed load.
    DistributedLoad(DistributedLoad),
    /// A moment load.
    MomentLoad(MomentLoad),
    /// A support.
    Support(Support),
}

impl EntityValue {
    /// Tagged identifier of the entity.
    #[must_use]
    pub fn entity_ref(&self) -> EntityRef {
        match self {
            Self::Node(node) => EntityRef::Node(node.id.clone()),
            Self::Member(member) => EntityRef::Member(member.id.clone()),
            Self::PointLoad(load) => EntityRef::PointLoad(load.id.clone()),
            Self::DistributedLoad(load) => EntityRef::DistributedLoad(load.id.clone()),
            Self::MomentLoad(load) => EntityRef::MomentLoad(load.id.clone()),
            Self::Support(support) => EntityRef::Support(support.id.clone()),
        }
    }

    /// Entities whose resolved state this entity reads, without duplicates.
    #[must_use]
    pub fn dependencies(&self) -> BTreeSet<EntityRef> {
        match self {
            Self::Node(node) => node
                .constraints()
                .into_iter()
                .flat_map(Constraint::references)
                .collect(),
            Self::Member(member) => member
                .node_ids()
                .into_iter()
                .map(|id| EntityRef::Node(id.to_string()))
                .collect(),
            Self::PointLoad(PointLoad { attachment, .. })
            | Self::MomentLoad(MomentLoad { attachment, .. })
            | Self::Support(Support { attachment, .. }) => {
                attachment.references().into_iter().collect()
            }
            Self::DistributedLoad(load) => {
                let span = &load.on_member;
                std::iter::once(EntityRef::Member(span.id.clone()))
                    .chain(span.constraint_start.references())
                    .chain(span.constraint_end.references())
                    .collect()
            }
        }
    }
}

/// Resolved snapshot of every entity of the frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySet {
    /// Nodes by identifier.
    pub nodes: BTreeMap<String, Node>,
    /// Members by identifier.
    pub members: BTreeMap<String, Member>,
    /// Point loads by identifier.
    pub point_loads: BTreeMap<String, PointLoad>,
    /// Distributed loads by identifier.
    pub distributed_loads: BTreeMap<String, DistributedLoad>,
    /// Moment loads by identifier.
    pub moment_loads: BTreeMap<String, MomentLoad>,
    /// Supports by identifier.
    pub supports: BTreeMap<String, Support>,
}

impl EntitySet {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
            + self.members.len()
            + self.point_loads.len()
            + self.distributed_loads.len()
            + self.moment_loads.len()
            + self.supports.len()
    }

    /// Whether the snapshot holds no entity at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a node.
    #[must_use]
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Look up a member.
    #[must_use]
    pub fn get_member(&self, id: &str) -> Option<&Member> {
        self.members.get(id)
    }

    /// Whether the referenced entity exists.
    #[must_use]
    pub fn contains(&self, entity: &EntityRef) -> bool {
        match entity {
            EntityRef::Node(id) => self.nodes.contains_key(id),
            EntityRef::Member(id) => self.members.contains_key(id),
            EntityRef::PointLoad(id) => self.point_loads.contains_key(id),
            EntityRef::DistributedLoad(id) => self.distributed_loads.contains_key(id),
            EntityRef::MomentLoad(id) => self.moment_loads.contains_key(id),
            EntityRef::Support(id) => self.supports.contains_key(id),
        }
    }

    /// Clone the referenced entity into an [`EntityValue`].
    #[must_use]
    pub fn value_of(&self, entity: &EntityRef) -> Option<EntityValue> {
        match entity {
            EntityRef::Node(id) => self.nodes.get(id).cloned().map(EntityValue::Node),
            EntityRef::Member(id) => self.members.get(id).cloned().map(EntityValue::Member),
            EntityRef::PointLoad(id) => self.point_loads.get(id).cloned().map(EntityValue::PointLoad),
            EntityRef::DistributedLoad(id) => self
                .distributed_loads
                .get(id)
                .cloned()
                .map(EntityValue::DistributedLoad),
            EntityRef::MomentLoad(id) => {
                self.moment_loads.get(id).cloned().map(EntityValue::MomentLoad)
            }
            EntityRef::Support(id) => self.supports.get(id).cloned().map(EntityValue::Support),
        }
    }

    /// Store an entity, replacing any previous value with the same identifier.
    pub fn insert(&mut self, value: EntityValue) {
        match value {
            EntityValue::Node(node) => {
                self.nodes.insert(node.id.clone(), node);
            }
            EntityValue::Member(member) => {
                self.members.insert(member.id.clone(), member);
            }
            EntityValue::PointLoad(load) => {
                self.point_loads.insert(load.id.clone(), load);
            }
            EntityValue::DistributedLoad(load) => {
                self.distributed_loads.insert(load.id.clone(), load);
            }
            EntityValue::MomentLoad(load) => {
                self.moment_loads.insert(load.id.clone(), load);
            }
            EntityValue::Support(support) => {
                self.supports.insert(support.id.clone(), support);
            }
        }
    }

    /// Remove an entity, returning whether it existed.
    pub fn remove(&mut self, entity: &EntityRef) -> bool {
        match entity {
            EntityRef::Node(id) => self.nodes.remove(id).is_some(),
            EntityRef::Member(id) => self.members.remove(id).is_some(),
            EntityRef::PointLoad(id) => self.point_loads.remove(id).is_some(),
            EntityRef::DistributedLoad(id) => self.distributed_loads.remove(id).is_some(),
            EntityRef::MomentLoad(id) => self.moment_loads.remove(id).is_some(),
            EntityRef::Support(id) => self.supports.remove(id).is_some(),
        }
    }

    /// Mark an entity as needing attention. Members carry no flag and are ignored.
    ///
    /// Returns whether a flag was set.
    pub fn flag_attention(&mut self, entity: &EntityRef, reason: &str) -> bool {
        match self.attention_fields(entity) {
            Some((flag, message)) => {
                *flag = true;
                *message = Some(reason.to_string());
                true
            }
            None => false,
        }
    }

    /// Clear the attention flag of an entity.
    pub fn clear_attention(&mut self, entity: &EntityRef) {
        if let Some((flag, message)) = self.attention_fields(entity) {
            *flag = false;
            *message = None;
        }
    }

    /// Whether the entity currently carries an attention flag.
    #[must_use]
    pub fn needs_attention(&self, entity: &EntityRef) -> bool {
        match entity {
            EntityRef::Node(id) => self.nodes.get(id).is_some_and(|n| n.needs_attention),
            EntityRef::Member(_) => false,
            EntityRef::PointLoad(id) => self.point_loads.get(id).is_some_and(|l| l.needs_attention),
            EntityRef::DistributedLoad(id) => self
                .distributed_loads
                .get(id)
                .is_some_and(|l| l.needs_attention),
            EntityRef::MomentLoad(id) => {
                self.moment_loads.get(id).is_some_and(|l| l.needs_attention)
            }
            EntityRef::Support(id) => self.supports.get(id).is_some_and(|s| s.needs_attention),
        }
    }

    /// Every entity carrying an attention flag.
    #[must_use]
    pub fn attention_required(&self) -> Vec<EntityRef> {
        let nodes = self
            .nodes
            .values()
            .filter(|n| n.needs_attention)
            .map(|n| EntityRef::Node(n.id.clone()));
        let point_loads = self
            .point_loads
            .values()
            .filter(|l| l.needs_attention)
            .map(|l| EntityRef::PointLoad(l.id.clone()));
        let distributed_loads = self
            .distributed_loads
            .values()
            .filter(|l| l.needs_attention)
            .map(|l| EntityRef::DistributedLoad(l.id.clone()));
        let moment_loads = self
            .moment_loads
            .values()
            .filter(|l| l.needs_attention)
            .map(|l| EntityRef::MomentLoad(l.id.clone()));
        let supports = self
            .supports
            .values()
            .filter(|s| s.needs_attention)
            .map(|s| EntityRef::Support(s.id.clone()));
        nodes
            .chain(point_loads)
            .chain(distributed_loads)
            .chain(moment_loads)
            .chain(supports)
            .collect()
    }

    /// Mutable attention flag and reason of an entity that carries them.
    fn attention_fields(&mut self, entity: &EntityRef) -> Option<(&mut bool, &mut Option<String>)> {
        match entity {
            EntityRef::Node(id) => self
                .nodes
                .get_mut(id)
                .map(|n| (&mut n.needs_attention, &mut n.attention_reason)),
            EntityRef::Member(_) => None,
            EntityRef::PointLoad(id) => self
                .point_loads
                .get_mut(id)
                .map(|l| (&mut l.needs_attention, &mut l.attention_reason)),
            EntityRef::DistributedLoad(id) => self
                .distributed_loads
                .get_mut(id)
                .map(|l| (&mut l.needs_attention, &mut l.attention_reason)),
            EntityRef::MomentLoad(id) => self
                .moment_loads
                .get_mut(id)
                .map(|l| (&mut l.needs_attention, &mut l.attention_reason)),
            EntityRef::Support(id) => self
                .supports
                .get_mut(id)
                .map(|s| (&mut s.needs_attention, &mut s.attention_reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_map_to_kinds_by_prefix() {
        let cases = [
            ("n1", EntityKind::Node),
            ("m12", EntityKind::Member),
            ("pl4", EntityKind::PointLoad),
            ("dl2", EntityKind::DistributedLoad),
            ("ml9", EntityKind::MomentLoad),
            ("s3", EntityKind::Support),
        ];
        for (id, kind) in cases {
            let entity = EntityRef::from_id(id).expect("known prefix");
            assert_eq!(entity.kind(), kind);
            assert_eq!(entity.id(), id);
        }
        assert_eq!(
            EntityRef::from_id("x1"),
            Err(IdError::UnknownPrefix("x1".to_string()))
        );
    }

    #[test]
    fn checked_identifiers_reject_other_kinds() {
        assert!(EntityRef::checked(EntityKind::Member, "m1").is_ok());
        assert_eq!(
            EntityRef::checked(EntityKind::Member, "ml1"),
            Err(IdError::KindMismatch {
                id: "ml1".to_string(),
                expected: EntityKind::Member,
            })
        );
    }

    #[test]
    fn dependencies_follow_constraints_and_attachments() {
        let node = Node::new("n3", Constraint::member("m1"), Constraint::angle(30.0, "n1"));
        let deps = EntityValue::Node(node).dependencies();
        assert_eq!(
            deps.into_iter().collect::<Vec<_>>(),
            vec![EntityRef::Node("n1".into()), EntityRef::Member("m1".into())]
        );

        let load = PointLoad::new("pl1", Attachment::member("m1", Constraint::x(2.0)), 5.0);
        assert_eq!(
            EntityValue::PointLoad(load).dependencies().len(),
            1,
            "an X constraint references nothing"
        );

        let member = Member::new("m2", "n1", "n2");
        assert_eq!(EntityValue::Member(member).dependencies().len(), 2);
    }

    #[test]
    fn constraint_json_uses_camel_case() {
        let json = serde_json::to_value(Constraint::angle(45.0, "n1")).unwrap();
        assert_eq!(json["type"], "Angle");
        assert_eq!(json["contextNodeId"], "n1");
        assert!(json.get("memberId").is_none());
    }

    #[test]
    fn placements_are_inlined_into_loads_and_supports() {
        let json = r#"{"entity": "PointLoad", "id": "pl1", "magnitude": 5.0,
            "onMember": {"id": "m1", "constraint": {"type": "X", "value": 5.0}}}"#;
        let value: EntityValue = serde_json::from_str(json).expect("flat point load parses");
        let EntityValue::PointLoad(load) = &value else {
            panic!("expected a point load, got {value:?}");
        };
        assert_eq!(load.attachment, Attachment::member("m1", Constraint::x(5.0)));

        let back = serde_json::to_value(&value).unwrap();
        assert_eq!(back["onMember"]["id"], "m1");
        assert!(back.get("attachment").is_none());

        let support: EntityValue = serde_json::from_str(
            r#"{"entity": "Support", "id": "s1", "type": "Roller", "onNode": {"id": "n1"}}"#,
        )
        .expect("flat support parses");
        assert_eq!(
            support,
            EntityValue::Support(Support::new("s1", Attachment::node("n1"), SupportType::Roller))
        );
        let moment = serde_json::to_value(EntityValue::MomentLoad(MomentLoad::new(
            "ml1",
            Attachment::node("n2"),
            2.0,
        )))
        .unwrap();
        assert_eq!(moment["onNode"]["id"], "n2");
    }

    #[test]
    fn node_assembly_defaults_to_hinge() {
        let node: Node = serde_json::from_str(
            r#"{"id": "n1", "constraint1": {"type": "X"}, "constraint2": {"type": "Y"}}"#,
        )
        .unwrap();
        assert_eq!(node.assembly, None);
        assert_eq!(node.assembly(), Assembly::Hinge);
        assert_eq!(node.with_assembly(Assembly::Stiff).assembly(), Assembly::Stiff);
    }

    #[test]
    fn attention_flags_are_set_and_cleared() {
        let mut set = EntitySet::new();
        set.insert(EntityValue::Node(Node::fixed("n1", 0.0, 0.0)));
        let node = EntityRef::Node("n1".into());
        assert!(set.flag_attention(&node, "moved"));
        assert!(set.needs_attention(&node));
        assert_eq!(set.attention_required(), vec![node.clone()]);
        set.clear_attention(&node);
        assert!(!set.needs_attention(&node));
        assert!(!set.flag_attention(&EntityRef::Member("m1".into()), "ignored"));
    }
}
