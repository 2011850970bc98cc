#![warn(clippy::pedantic)]

use approx::assert_relative_eq;
use framex::side_mounted::{LOAD_OUTSIDE_MEMBER, NODE_OUTSIDE_MEMBER};
use framex::{
    is_side_mounted_node, process_side_mounted_nodes, reduce_history, Action, ActionError,
    Assembly, Attachment, Constraint, EntityRef, EntitySet, GraphError, Member, MomentLoad, Node,
    PointLoad, Support, SupportType,
};

fn beam() -> Vec<Action> {
    vec![
        Action::create(Node::fixed("n1", 0.0, 0.0)),
        Action::create(Node::fixed("n2", 10.0, 0.0)),
        Action::create(Member::new("m1", "n1", "n2")),
    ]
}

/// Beam with a post standing on it at x = 4.
fn beam_with_post() -> Vec<Action> {
    let mut history = beam();
    history.extend([
        Action::create(Node::new("n3", Constraint::member("m1"), Constraint::x(4.0))),
        Action::create(Node::fixed("n4", 4.0, 5.0)),
        Action::create(Member::new("m2", "n3", "n4")),
    ]);
    history
}

fn reduce(history: &[Action]) -> EntitySet {
    reduce_history(history).expect("history reduces")
}

#[test]
fn shortening_a_member_flags_the_load_left_beyond_it() {
    let mut history = beam();
    history.push(Action::create(PointLoad::new(
        "pl1",
        Attachment::member("m1", Constraint::x(5.0)),
        10.0,
    )));
    history.push(Action::update(
        Node::fixed("n2", 4.0, 0.0),
        Node::fixed("n2", 10.0, 0.0),
    ));

    let set = reduce(&history);
    let load = &set.point_loads["pl1"];
    assert!(load.needs_attention);
    assert_eq!(load.attention_reason.as_deref(), Some(LOAD_OUTSIDE_MEMBER));
    assert_relative_eq!(load.resolved.x, 5.0);
    assert_relative_eq!(set.members["m1"].resolved.point2.x, 4.0);
    assert_eq!(set.attention_required(), vec![EntityRef::PointLoad("pl1".into())]);
}

#[test]
fn loads_still_within_the_member_are_not_flagged() {
    let mut history = beam();
    history.push(Action::create(MomentLoad::new(
        "ml1",
        Attachment::member("m1", Constraint::x(2.0)),
        3.0,
    )));
    history.push(Action::update(
        Node::fixed("n2", 4.0, 0.0),
        Node::fixed("n2", 10.0, 0.0),
    ));
    let set = reduce(&history);
    assert!(!set.moment_loads["ml1"].needs_attention);
    assert!(set.attention_required().is_empty());
}

#[test]
fn posts_on_a_beam_are_side_mounted() {
    let set = reduce(&beam_with_post());
    assert_relative_eq!(set.nodes["n3"].resolved.x, 4.0);
    assert_relative_eq!(set.nodes["n3"].resolved.y, 0.0);
    assert!(is_side_mounted_node("n3", &set));
    assert!(!is_side_mounted_node("n1", &set));
    assert_eq!(set.members["m1"].dependants, vec!["n3".to_string()]);

    let drawn = process_side_mounted_nodes(&set, 0.1);
    assert_eq!(drawn.len(), 1);
    assert_relative_eq!(drawn["n3"].x, 4.0);
    assert_relative_eq!(drawn["n3"].y, 0.1, epsilon = 1e-12);

    let mut history = beam_with_post();
    history.extend([
        Action::create(Node::fixed("n5", 4.0, -5.0)),
        Action::create(Member::new("m3", "n5", "n3")),
    ]);
    let set = reduce(&history);
    assert!(!is_side_mounted_node("n3", &set), "members on both sides");
    assert!(process_side_mounted_nodes(&set, 0.1).is_empty());
}

#[test]
fn freshly_placed_node_on_a_member_is_side_mounted() {
    let mut history = beam();
    history.push(Action::create(Node::new(
        "n3",
        Constraint::member("m1"),
        Constraint::x(2.0),
    )));
    let set = reduce(&history);
    assert!(is_side_mounted_node("n3", &set));
    assert!(process_side_mounted_nodes(&set, 0.1).is_empty(), "no side to lean to");
}

#[test]
fn side_mounted_node_left_beyond_its_member_is_flagged() {
    let mut history = beam_with_post();
    history.push(Action::update(
        Node::fixed("n2", 3.0, 0.0),
        Node::fixed("n2", 10.0, 0.0),
    ));
    let set = reduce(&history);
    let node = &set.nodes["n3"];
    assert!(node.needs_attention);
    assert_eq!(node.attention_reason.as_deref(), Some(NODE_OUTSIDE_MEMBER));

    // Re-pinning the node within the member is an explicit edit.
    history.push(Action::update(
        Node::new("n3", Constraint::member("m1"), Constraint::x(2.0)),
        Node::new("n3", Constraint::member("m1"), Constraint::x(4.0)),
    ));
    let set = reduce(&history);
    assert!(!set.nodes["n3"].needs_attention);
    assert_relative_eq!(set.members["m2"].resolved.point1.x, 2.0);
}

#[test]
fn moving_a_node_cascades_through_polar_dependants() {
    let history = vec![
        Action::create(Node::fixed("n1", 0.0, 0.0)),
        Action::create(Node::fixed("n2", 0.0, 4.0)),
        Action::create(Member::new("m1", "n1", "n2")),
        Action::create(Node::new(
            "n3",
            Constraint::distance(5.0, "n2"),
            Constraint::angle(0.0, "n2"),
        )),
        Action::create(Member::new("m2", "n2", "n3")),
        Action::update(Node::fixed("n2", 0.0, 6.0), Node::fixed("n2", 0.0, 4.0)),
    ];
    let set = reduce(&history);
    let n3 = set.nodes["n3"].resolved;
    assert_relative_eq!(n3.x, 5.0, epsilon = 1e-9);
    assert_relative_eq!(n3.y, 6.0, epsilon = 1e-9);
    let m2 = set.members["m2"].resolved;
    assert_relative_eq!(m2.point2.x, 5.0, epsilon = 1e-9);
    assert_relative_eq!(m2.point2.y, 6.0, epsilon = 1e-9);
    assert_eq!(
        set.nodes["n2"].dependants,
        vec!["n3".to_string(), "m1".to_string(), "m2".to_string()]
    );
}

#[test]
fn node_assembly_is_mirrored_onto_member_ends() {
    let mut history = beam();
    history.push(Action::update(
        Node::fixed("n2", 10.0, 0.0).with_assembly(Assembly::Stiff),
        Node::fixed("n2", 10.0, 0.0),
    ));
    let set = reduce(&history);
    assert_eq!(set.members["m1"].node2.assembly, Assembly::Stiff);
    assert_eq!(set.members["m1"].node1.assembly, Assembly::Hinge);
}

#[test]
fn json_update_without_assembly_keeps_a_stiff_joint() {
    let log = r#"[
        {"type": "Create", "value": {"entity": "Node", "id": "n1", "assembly": "Stiff",
            "constraint1": {"type": "X", "value": 0.0}, "constraint2": {"type": "Y", "value": 0.0}}},
        {"type": "Create", "value": {"entity": "Node", "id": "n2",
            "constraint1": {"type": "X", "value": 5.0}, "constraint2": {"type": "Y", "value": 0.0}}},
        {"type": "Create", "value": {"entity": "Member", "id": "m1",
            "node1": {"id": "n1"}, "node2": {"id": "n2"}}},
        {"type": "Update",
            "value": {"entity": "Node", "id": "n1",
                "constraint1": {"type": "X", "value": 1.0}, "constraint2": {"type": "Y", "value": 0.0}},
            "previous": {"entity": "Node", "id": "n1", "assembly": "Stiff",
                "constraint1": {"type": "X", "value": 0.0}, "constraint2": {"type": "Y", "value": 0.0}}}
    ]"#;
    let history: Vec<Action> = serde_json::from_str(log).expect("log parses");
    let set = reduce(&history);
    assert_eq!(set.nodes["n1"].assembly(), Assembly::Stiff);
    assert_eq!(set.members["m1"].node1.assembly, Assembly::Stiff);
    assert_relative_eq!(set.nodes["n1"].resolved.x, 1.0);
}

#[test]
fn deleting_a_member_detaches_posts_and_cleans_up_ends() {
    let mut history = beam_with_post();
    history.extend([
        Action::create(Support::new("s1", Attachment::node("n1"), SupportType::Pinned)),
        Action::create(PointLoad::new("pl1", Attachment::node("n2"), 8.0)),
        Action::create(PointLoad::new(
            "pl2",
            Attachment::member("m1", Constraint::x(7.0)),
            8.0,
        )),
        Action::delete(EntityRef::Member("m1".into())),
    ]);
    let set = reduce(&history);

    assert!(!set.members.contains_key("m1"));
    assert!(set.point_loads.is_empty(), "both loads go with the member");
    assert!(set.nodes.contains_key("n1"), "kept alive by its support");
    assert!(!set.nodes.contains_key("n2"), "only carried a load");

    let post = &set.nodes["n3"];
    assert_eq!(post.constraint1, Constraint::x(4.0));
    assert_eq!(post.constraint2, Constraint::y(0.0));
    assert_eq!(post.dependants, vec!["m2".to_string()]);
    assert!(!is_side_mounted_node("n3", &set));
}

#[test]
fn nodes_with_dependants_are_not_deleted() {
    let mut history = beam();
    history.push(Action::delete(EntityRef::Node("n1".into())));
    let set = reduce(&history);
    assert!(set.nodes.contains_key("n1"));

    history.push(Action::delete(EntityRef::Member("m1".into())));
    let set = reduce(&history);
    assert!(set.is_empty(), "free end nodes go with the member");
}

#[test]
fn undo_reverts_actions_in_reverse() {
    let mut history = beam();
    history.extend([Action::Undo, Action::Undo, Action::Undo]);
    assert!(reduce(&history).is_empty());

    let history = vec![
        Action::create(Node::fixed("n1", 0.0, 0.0)),
        Action::update(Node::fixed("n1", 2.0, 0.0), Node::fixed("n1", 0.0, 0.0)),
        Action::Undo,
    ];
    assert_relative_eq!(reduce(&history).nodes["n1"].resolved.x, 0.0);
}

#[test]
fn cycles_and_unknown_entities_abort_the_reduction() {
    let mut history = beam();
    history.push(Action::update(
        Node::new("n1", Constraint::member("m1"), Constraint::x(0.0)),
        Node::fixed("n1", 0.0, 0.0),
    ));
    let error = reduce_history(&history).expect_err("a node cannot sit on its own member");
    assert!(matches!(
        error.action_error(),
        ActionError::Graph(GraphError::Cycle { .. })
    ));

    let mut history = beam();
    history.push(Action::delete(EntityRef::PointLoad("pl9".into())));
    let error = reduce_history(&history).expect_err("pl9 was never created");
    assert_eq!(
        error.to_string(),
        "action #3 (delete point load \"pl9\") could not be applied: point load \"pl9\" does not exist"
    );
}

#[test]
fn reduces_a_json_action_log() {
    let log = r#"[
        {"type": "Create", "value": {"entity": "Node", "id": "n1",
            "constraint1": {"type": "X", "value": 0.0}, "constraint2": {"type": "Y", "value": 0.0}}},
        {"type": "Create", "value": {"entity": "Node", "id": "n2",
            "constraint1": {"type": "X", "value": 6.0}, "constraint2": {"type": "Y", "value": 0.0}}},
        {"type": "Create", "value": {"entity": "Member", "id": "m1",
            "node1": {"id": "n1"}, "node2": {"id": "n2"}, "memberprop": {"profile": "IPE200"}}},
        {"type": "Create", "value": {"entity": "Support", "id": "s1",
            "onNode": {"id": "n1"}, "type": "Fixed"}},
        {"type": "Create", "value": {"entity": "PointLoad", "id": "pl1", "magnitude": 12.0,
            "onMember": {"id": "m1", "constraint": {"type": "X", "value": 3.0}}}},
        {"type": "Undo"},
        {"type": "Create", "value": {"entity": "MomentLoad", "id": "ml1", "magnitude": 4.0,
            "onNode": {"id": "n2"}}}
    ]"#;
    let history: Vec<Action> = serde_json::from_str(log).expect("log parses");
    let set = reduce(&history);

    assert!(set.point_loads.is_empty());
    assert_eq!(set.supports["s1"].kind, SupportType::Fixed);

    let json = serde_json::to_value(&set).expect("set serializes");
    assert_eq!(json["momentLoads"]["ml1"]["resolved"]["x"], 6.0);
    assert_eq!(json["members"]["m1"]["memberprop"]["profile"], "IPE200");
    assert_eq!(json["nodes"]["n1"]["dependants"], serde_json::json!(["m1", "s1"]));

    assert_eq!(json["supports"]["s1"]["onNode"]["id"], "n1");
    assert!(json["momentLoads"]["ml1"].get("attachment").is_none());

    let back: EntitySet = serde_json::from_value(json).expect("set deserializes");
    assert_eq!(back, set);
}
