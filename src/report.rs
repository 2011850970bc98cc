use framex::side_mounted::process_side_mounted_nodes;
use framex::EntitySet;
use std::fmt::Write;

/// Render a textual summary of a reduced frame.
///
/// Side-mounted nodes are listed with the position they are drawn at, shifted
/// `offset` metres toward their member.
#[must_use]
pub fn render_summary(set: &EntitySet, offset: f64) -> String {
    let mut output = String::new();

    writeln!(
        &mut output,
        "Frame: {} nodes, {} members, {} loads, {} supports",
        set.nodes.len(),
        set.members.len(),
        set.point_loads.len() + set.distributed_loads.len() + set.moment_loads.len(),
        set.supports.len()
    )
    .expect("writing to string cannot fail");

    for node in set.nodes.values() {
        writeln!(
            &mut output,
            "  node {:<6} ({:+.3}, {:+.3}) {:?}",
            node.id, node.resolved.x, node.resolved.y, node.assembly()
        )
        .expect("writing to string cannot fail");
    }
    for member in set.members.values() {
        writeln!(
            &mut output,
            "  member {:<4} {} -> {} length {:.3} m",
            member.id,
            member.node1.id,
            member.node2.id,
            member.resolved.length()
        )
        .expect("writing to string cannot fail");
    }

    let drawn = process_side_mounted_nodes(set, offset);
    for (id, position) in &drawn {
        writeln!(
            &mut output,
            "  side-mounted {id} drawn at ({:+.3}, {:+.3})",
            position.x, position.y
        )
        .expect("writing to string cannot fail");
    }

    let flagged = set.attention_required();
    if flagged.is_empty() {
        output.push_str("No entity needs attention\n");
    } else {
        for entity in flagged {
            writeln!(&mut output, "  attention: {entity}").expect("writing to string cannot fail");
        }
    }

    output
}
