use crate::model::*;

fn kind_name(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::File => "file",
        NodeKind::Dir => "dir",
    }
}

pub fn to_csv(tree: &PackedTree, mut w: impl std::io::Write) -> crate::Result<()> {
    let mut writer = csv::Writer::from_writer(&mut w);
    writer.write_record(["path", "name", "kind", "depth", "x", "y", "r", "value", "changes"])?;
    for n in &tree.nodes {
        writer.write_record([
            n.path.clone(),
            n.name.clone(),
            kind_name(n.kind).to_string(),
            n.depth.to_string(),
            format!("{:.3}", n.x),
            format!("{:.3}", n.y),
            format!("{:.3}", n.r),
            n.value.to_string(),
            n.changes.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_json(tree: &PackedTree) -> serde_json::Value {
    serde_json::json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "root": tree.root.index(),
        "nodes": tree.nodes.iter().map(|n| serde_json::json!({
            "id": n.id.index(),
            "parent": n.parent.map(NodeId::index),
            "path": n.path,
            "name": n.name,
            "kind": kind_name(n.kind),
            "depth": n.depth,
            "x": n.x,
            "y": n.y,
            "r": n.r,
            "value": n.value,
            "changes": n.changes,
            "repo_link": n.repo_link,
            "children": n.children.iter().map(|c| c.index()).collect::<Vec<_>>()
        })).collect::<Vec<_>>()
    })
}
