//! Property-based invariant tests for the packed layout.
//!
//! For arbitrary trees (up to three levels deep, zero-sized leaves included):
//!
//! 1. Every circle has a non-negative radius and lies inside its parent.
//! 2. Sibling circles never overlap.
//! 3. A larger leaf never gets a smaller circle than a sibling leaf.
//! 4. Colors depend only on the node, not on zoom state.
//! 5. After any sequence of focus changes the view settles on the last target.

use std::time::{Duration, Instant};

use bubblemap_core::zoom::View;
use bubblemap_core::{HierarchicalPackLayout, PackedTree, TreeDataset, TreeNode};
use proptest::prelude::*;

const TOLERANCE: f64 = 1e-4;

// ── Helpers ─────────────────────────────────────────────────────────────

fn node_strategy() -> impl Strategy<Value = TreeNode> {
    let leaf = (0u32..=400, 0u32..=20).prop_map(|(size, changes)| TreeNode::file("f", size as f64, changes as f64));
    leaf.prop_recursive(2, 40, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(|children| TreeNode::dir("d", children))
    })
}

fn dataset_strategy() -> impl Strategy<Value = TreeDataset> {
    prop::collection::vec(node_strategy(), 1..6).prop_map(|children| {
        let mut root = TreeNode::dir("root", children);
        let mut counter = 0;
        rename(&mut root, &mut counter);
        TreeDataset::new(root, 0.0, 20.0)
    })
}

/// Gives every node a unique name, and every file a unique path.
fn rename(node: &mut TreeNode, counter: &mut usize) {
    *counter += 1;
    if node.is_file() {
        node.path = format!("f{counter}.py");
        node.name = node.path.clone();
    } else if node.name != "root" {
        node.name = format!("d{counter}");
    }
    for child in &mut node.children {
        rename(child, counter);
    }
}

fn built(dataset: &TreeDataset) -> HierarchicalPackLayout {
    let mut layout = HierarchicalPackLayout::default();
    layout.build(dataset).expect("generated trees are never empty");
    layout
}

fn distance(tree: &PackedTree, a: usize, b: usize) -> f64 {
    let (a, b) = (&tree.nodes[a], &tree.nodes[b]);
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

fn close(a: View, b: View) -> bool {
    (a.cx - b.cx).abs() < 1e-6 && (a.cy - b.cy).abs() < 1e-6 && (a.diameter - b.diameter).abs() < 1e-6
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Containment
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn circles_nest_inside_parents(dataset in dataset_strategy()) {
        let layout = built(&dataset);
        let tree = layout.tree().unwrap();
        for node in &tree.nodes {
            prop_assert!(node.r >= 0.0, "negative radius on {}", node.name);
            let Some(parent) = node.parent else { continue };
            let gap = distance(tree, node.id.index(), parent.index()) + node.r;
            prop_assert!(
                gap <= tree.nodes[parent.index()].r + TOLERANCE,
                "{} pokes out of its parent by {}",
                node.name,
                gap - tree.nodes[parent.index()].r
            );
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Siblings do not overlap
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn siblings_stay_apart(dataset in dataset_strategy()) {
        let layout = built(&dataset);
        let tree = layout.tree().unwrap();
        for node in &tree.nodes {
            for (i, a) in node.children.iter().enumerate() {
                for b in &node.children[i + 1..] {
                    let reach = tree.nodes[a.index()].r + tree.nodes[b.index()].r;
                    prop_assert!(
                        distance(tree, a.index(), b.index()) >= reach - TOLERANCE,
                        "siblings {} and {} overlap",
                        tree.nodes[a.index()].name,
                        tree.nodes[b.index()].name
                    );
                }
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Leaf radii follow leaf sizes
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn larger_leaves_get_larger_circles(dataset in dataset_strategy()) {
        let layout = built(&dataset);
        let tree = layout.tree().unwrap();
        for node in &tree.nodes {
            let leaves: Vec<_> = node
                .children
                .iter()
                .map(|c| &tree.nodes[c.index()])
                .filter(|c| !c.has_children())
                .collect();
            for a in &leaves {
                for b in &leaves {
                    if a.value > b.value {
                        prop_assert!(a.r + TOLERANCE >= b.r, "{} is drawn smaller than {}", a.name, b.name);
                    }
                }
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Colors ignore zoom state
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn colors_ignore_zoom(dataset in dataset_strategy(), pick in any::<prop::sample::Index>()) {
        let mut layout = built(&dataset);
        let before: Vec<_> = layout.tree().unwrap().nodes.iter().map(|n| layout.color_for(n)).collect();

        let target = layout.tree().unwrap().nodes[pick.index(before.len())].id;
        let t0 = Instant::now();
        layout.focus(target, t0, false);
        layout.tick(t0 + Duration::from_millis(300));

        let after: Vec<_> = layout.tree().unwrap().nodes.iter().map(|n| layout.color_for(n)).collect();
        prop_assert_eq!(before, after);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Superseded transitions settle on the latest target
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn focus_settles_on_latest_target(
        dataset in dataset_strategy(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 1..6),
    ) {
        let mut layout = built(&dataset);
        let ids: Vec<_> = layout.tree().unwrap().nodes.iter().map(|n| n.id).collect();
        let t0 = Instant::now();
        let mut last = ids[0];
        for (step, pick) in picks.iter().enumerate() {
            last = ids[pick.index(ids.len())];
            layout.focus(last, t0 + Duration::from_millis(100 * step as u64), false);
        }
        prop_assert!(!layout.tick(t0 + Duration::from_secs(10)));
        prop_assert!(!layout.is_animating());
        prop_assert_eq!(layout.focus_id(), Some(last));

        let target = layout.node(last).unwrap();
        let expected = View::new(target.x, target.y, target.r * 2.0);
        let view = layout.view().unwrap();
        prop_assert!(close(view, expected), "settled on {:?}, expected {:?}", view, expected);
    }
}
