use framex::{
    reduce_history, Action, Assembly, Attachment, Constraint, EntityRef, Member, MemberSpan,
    DistributedLoad, Node, PointLoad, Support, SupportType,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let history = vec![
        Action::create(Node::fixed("n1", 0.0, 0.0)),
        Action::create(Node::fixed("n2", 6.0, 0.0)),
        Action::create(Node::fixed("n3", 0.0, 4.0).with_assembly(Assembly::Stiff)),
        Action::create(Node::fixed("n4", 6.0, 4.0).with_assembly(Assembly::Stiff)),
        Action::create(Member::new("m1", "n1", "n3")),
        Action::create(Member::new("m2", "n2", "n4")),
        Action::create(Member::new("m3", "n3", "n4")),
        Action::create(Support::new("s1", Attachment::node("n1"), SupportType::Fixed)),
        Action::create(Support::new("s2", Attachment::node("n2"), SupportType::Fixed)),
        Action::create(DistributedLoad::new(
            "dl1",
            MemberSpan {
                id: "m3".into(),
                constraint_start: Constraint::x(0.0),
                constraint_end: Constraint::x(6.0),
            },
            5.0,
        )),
        Action::create(PointLoad::new(
            "pl1",
            Attachment::member("m3", Constraint::x(5.0)),
            20.0,
        )),
        // Narrow the right-hand column line; the roof load follows its end.
        Action::update(
            Node::fixed("n4", 4.5, 4.0).with_assembly(Assembly::Stiff),
            Node::fixed("n4", 6.0, 4.0).with_assembly(Assembly::Stiff),
        ),
    ];

    let set = reduce_history(&history)?;

    let roof = &set.distributed_loads["dl1"].resolved;
    println!(
        "roof load from x = {:.2} to x = {:.2} m",
        roof.point1.x, roof.point2.x
    );
    for entity in set.attention_required() {
        println!("needs attention: {entity}");
    }
    assert!(set.attention_required().contains(&EntityRef::PointLoad("pl1".into())));

    Ok(())
}
