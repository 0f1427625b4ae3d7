//! Circle packing of a weighted tree.
//!
//! Siblings are placed with the front-chain algorithm of Wang et al.
//! ("Visualization of large hierarchical data by circle packing", 2006) and
//! each level is wrapped in its smallest enclosing circle (Welzl's move-to-front
//! algorithm, extended to circles). The shuffle used by the enclosure is seeded,
//! so a given tree always packs the same way.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::model::{NodeId, PackedNode, PackedTree, TreeNode};

static GENERATION: AtomicU32 = AtomicU32::new(1);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Circle {
    pub x: f64,
    pub y: f64,
    pub r: f64,
}

impl Circle {
    pub fn new(x: f64, y: f64, r: f64) -> Self {
        Self { x, y, r }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PackConfig {
    /// Side of the square canvas.
    pub width: f64,
    /// Gap between sibling circles and between a parent and its children.
    pub padding: f64,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            width: 932.0,
            padding: 3.0,
        }
    }
}

/// Lays out `tree` over a `width × width` square. The root ends up centered at
/// `(width / 2, width / 2)` with diameter `width`.
pub fn pack(tree: &TreeNode, config: &PackConfig) -> PackedTree {
    let generation = GENERATION.fetch_add(1, Ordering::Relaxed);
    let mut nodes = Vec::with_capacity(tree.leaf_count() * 2);
    let root = flatten(tree, None, 0, generation, &mut nodes);
    sort_children(&mut nodes);

    let mut circles: Vec<Circle> = nodes
        .iter()
        .map(|n| Circle::new(0.0, 0.0, if n.children.is_empty() { n.value.max(0.0).sqrt() } else { 0.0 }))
        .collect();

    let mut random = Lcg::default();
    let half = config.width / 2.0;
    pack_levels(&nodes, &mut circles, config.padding * 0.5, &mut random);
    let scale = circles[0].r / config.width;
    pack_levels(&nodes, &mut circles, config.padding * scale, &mut random);

    // Children hold offsets from their parent until this pass, which runs
    // parents first because the arena is in pre-order.
    let k = if circles[0].r > 0.0 { half / circles[0].r } else { 0.0 };
    circles[0] = Circle::new(half, half, half);
    for i in 1..nodes.len() {
        let parent = circles[nodes[i].parent.map(NodeId::index).unwrap_or(0)];
        let c = &mut circles[i];
        c.r *= k;
        c.x = parent.x + k * c.x;
        c.y = parent.y + k * c.y;
    }

    for (node, c) in nodes.iter_mut().zip(&circles) {
        node.x = c.x;
        node.y = c.y;
        node.r = c.r.max(0.0);
    }

    PackedTree {
        root,
        generation,
        nodes,
    }
}

fn flatten(node: &TreeNode, parent: Option<NodeId>, depth: u32, generation: u32, out: &mut Vec<PackedNode>) -> NodeId {
    let id = NodeId::new(out.len() as u32, generation);
    out.push(PackedNode {
        id,
        parent,
        children: Vec::with_capacity(node.children.len()),
        depth,
        x: 0.0,
        y: 0.0,
        r: 0.0,
        value: if node.children.is_empty() { node.size.max(0.0) } else { 0.0 },
        name: node.name.clone(),
        path: node.path.clone(),
        changes: node.changes,
        kind: node.kind(),
        repo_link: node.repo_link.clone(),
    });
    for child in &node.children {
        let cid = flatten(child, Some(id), depth + 1, generation, out);
        let value = out[cid.index()].value;
        let this = &mut out[id.index()];
        this.children.push(cid);
        this.value += value;
    }
    id
}

fn sort_children(nodes: &mut [PackedNode]) {
    let values: Vec<f64> = nodes.iter().map(|n| n.value).collect();
    for node in nodes.iter_mut() {
        node.children
            .sort_by(|a, b| values[b.index()].total_cmp(&values[a.index()]));
    }
}

/// Packs every internal node's children around the origin, deepest nodes
/// first, and sets the internal node's radius to the enclosing circle.
fn pack_levels(nodes: &[PackedNode], circles: &mut [Circle], pad: f64, random: &mut Lcg) {
    let mut level = Vec::new();
    for node in nodes.iter().rev() {
        if node.children.is_empty() {
            continue;
        }
        level.clear();
        level.extend(node.children.iter().map(|c| {
            let mut circle = circles[c.index()];
            circle.r += pad;
            circle
        }));
        let enclosing = pack_siblings(&mut level, random);
        for (c, placed) in node.children.iter().zip(&level) {
            circles[c.index()] = Circle::new(placed.x, placed.y, placed.r - pad);
        }
        circles[node.id.index()].r = enclosing + pad;
    }
}

/// Places `circles` side by side without overlap, centered on the origin,
/// and returns the radius of the circle enclosing them all.
pub fn pack_siblings(circles: &mut [Circle], random: &mut Lcg) -> f64 {
    let n = circles.len();
    if n == 0 {
        return 0.0;
    }

    circles[0].x = 0.0;
    circles[0].y = 0.0;
    if n == 1 {
        return circles[0].r;
    }

    circles[0].x = -circles[1].r;
    circles[1].x = circles[0].r;
    circles[1].y = 0.0;
    if n == 2 {
        return circles[0].r + circles[1].r;
    }

    let third = place(circles[1], circles[0], circles[2].r);
    circles[2].x = third.0;
    circles[2].y = third.1;

    // Front chain as a circular doubly linked list over circle indices.
    let mut next = vec![0usize; n];
    let mut prev = vec![0usize; n];
    let (mut a, mut b) = (0usize, 1usize);
    next[0] = 1;
    prev[2] = 1;
    next[1] = 2;
    prev[0] = 2;
    next[2] = 0;
    prev[1] = 0;

    let mut i = 3;
    'pack: while i < n {
        let (x, y) = place(circles[a], circles[b], circles[i].r);
        circles[i].x = x;
        circles[i].y = y;
        let c = i;

        // Look for the closest circle on the chain that intersects c, walking
        // forward from b and backward from a by accumulated radius.
        let (mut j, mut k) = (next[b], prev[a]);
        let (mut sj, mut sk) = (circles[b].r, circles[a].r);
        loop {
            if sj <= sk {
                if intersects(&circles[j], &circles[c]) {
                    b = j;
                    next[a] = b;
                    prev[b] = a;
                    continue 'pack;
                }
                sj += circles[j].r;
                j = next[j];
            } else {
                if intersects(&circles[k], &circles[c]) {
                    a = k;
                    next[a] = b;
                    prev[b] = a;
                    continue 'pack;
                }
                sk += circles[k].r;
                k = prev[k];
            }
            if j == next[k] {
                break;
            }
        }

        prev[c] = a;
        next[c] = b;
        next[a] = c;
        prev[b] = c;
        b = c;

        // The new pair (a, b) is the one whose weighted midpoint is closest to the origin.
        let mut best = score(circles, a, next[a]);
        let mut cur = next[c];
        while cur != b {
            let s = score(circles, cur, next[cur]);
            if s < best {
                a = cur;
                best = s;
            }
            cur = next[cur];
        }
        b = next[a];
        i += 1;
    }

    let mut chain = vec![circles[b]];
    let mut cur = next[b];
    while cur != b {
        chain.push(circles[cur]);
        cur = next[cur];
    }
    let e = enclose(&chain, random);

    for c in circles.iter_mut() {
        c.x -= e.x;
        c.y -= e.y;
    }
    e.r
}

/// Position for a circle of radius `r` tangent to both `b` and `a`.
fn place(b: Circle, a: Circle, r: f64) -> (f64, f64) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let d2 = dx * dx + dy * dy;
    if d2 == 0.0 {
        return (a.x + r, a.y);
    }
    let a2 = (a.r + r).powi(2);
    let b2 = (b.r + r).powi(2);
    if a2 > b2 {
        let x = (d2 + b2 - a2) / (2.0 * d2);
        let y = (b2 / d2 - x * x).max(0.0).sqrt();
        (b.x - x * dx - y * dy, b.y - x * dy + y * dx)
    } else {
        let x = (d2 + a2 - b2) / (2.0 * d2);
        let y = (a2 / d2 - x * x).max(0.0).sqrt();
        (a.x + x * dx - y * dy, a.y + x * dy + y * dx)
    }
}

fn intersects(a: &Circle, b: &Circle) -> bool {
    let dr = a.r + b.r - 1e-6;
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    dr > 0.0 && dr * dr > dx * dx + dy * dy
}

fn score(circles: &[Circle], a: usize, b: usize) -> f64 {
    let (a, b) = (circles[a], circles[b]);
    let ab = a.r + b.r;
    let (dx, dy) = if ab > 0.0 {
        ((a.x * b.r + b.x * a.r) / ab, (a.y * b.r + b.y * a.r) / ab)
    } else {
        ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    };
    dx * dx + dy * dy
}

/// Smallest circle enclosing all of `circles`.
pub fn enclose(circles: &[Circle], random: &mut Lcg) -> Circle {
    let mut shuffled = circles.to_vec();
    random.shuffle(&mut shuffled);

    let mut basis: Vec<Circle> = Vec::with_capacity(3);
    let mut e: Option<Circle> = None;
    let mut i = 0;
    while i < shuffled.len() {
        let p = shuffled[i];
        if e.is_some_and(|e| encloses_weak(&e, &p)) {
            i += 1;
            continue;
        }
        match extend_basis(&basis, p) {
            Some(next) => {
                basis = next;
                e = Some(enclose_basis(&basis));
                i = 0;
            }
            None => {
                tracing::warn!(count = circles.len(), "enclosing circle did not converge");
                return bounding_circle(circles);
            }
        }
    }
    e.unwrap_or_default()
}

fn extend_basis(basis: &[Circle], p: Circle) -> Option<Vec<Circle>> {
    if encloses_weak_all(&p, basis) {
        return Some(vec![p]);
    }

    for b in basis {
        if encloses_not(&p, b) && encloses_weak_all(&enclose2(b, &p), basis) {
            return Some(vec![*b, p]);
        }
    }

    for i in 0..basis.len().saturating_sub(1) {
        for j in i + 1..basis.len() {
            let (bi, bj) = (&basis[i], &basis[j]);
            if encloses_not(&enclose2(bi, bj), &p)
                && encloses_not(&enclose2(bi, &p), bj)
                && encloses_not(&enclose2(bj, &p), bi)
                && encloses_weak_all(&enclose3(bi, bj, &p), basis)
            {
                return Some(vec![*bi, *bj, p]);
            }
        }
    }
    None
}

fn encloses_not(a: &Circle, b: &Circle) -> bool {
    let dr = a.r - b.r;
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    dr < 0.0 || dr * dr < dx * dx + dy * dy
}

fn encloses_weak(a: &Circle, b: &Circle) -> bool {
    let dr = a.r - b.r + a.r.max(b.r).max(1.0) * 1e-9;
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    dr > 0.0 && dr * dr > dx * dx + dy * dy
}

fn encloses_weak_all(a: &Circle, basis: &[Circle]) -> bool {
    basis.iter().all(|b| encloses_weak(a, b))
}

fn enclose_basis(basis: &[Circle]) -> Circle {
    match basis {
        [a] => *a,
        [a, b] => enclose2(a, b),
        [a, b, c] => enclose3(a, b, c),
        _ => Circle::default(),
    }
}

fn enclose2(a: &Circle, b: &Circle) -> Circle {
    let x21 = b.x - a.x;
    let y21 = b.y - a.y;
    let r21 = b.r - a.r;
    let l = (x21 * x21 + y21 * y21).sqrt();
    if l == 0.0 {
        return if a.r >= b.r { *a } else { *b };
    }
    Circle::new(
        (a.x + b.x + x21 / l * r21) / 2.0,
        (a.y + b.y + y21 / l * r21) / 2.0,
        (l + a.r + b.r) / 2.0,
    )
}

fn enclose3(a: &Circle, b: &Circle, c: &Circle) -> Circle {
    let (x1, y1, r1) = (a.x, a.y, a.r);
    let (x2, y2, r2) = (b.x, b.y, b.r);
    let (x3, y3, r3) = (c.x, c.y, c.r);
    let a2 = x1 - x2;
    let a3 = x1 - x3;
    let b2 = y1 - y2;
    let b3 = y1 - y3;
    let c2 = r2 - r1;
    let c3 = r3 - r1;
    let d1 = x1 * x1 + y1 * y1 - r1 * r1;
    let d2 = d1 - x2 * x2 - y2 * y2 + r2 * r2;
    let d3 = d1 - x3 * x3 - y3 * y3 + r3 * r3;
    let ab = a3 * b2 - a2 * b3;
    let xa = (b2 * d3 - b3 * d2) / (ab * 2.0) - x1;
    let xb = (b3 * c2 - b2 * c3) / ab;
    let ya = (a3 * d2 - a2 * d3) / (ab * 2.0) - y1;
    let yb = (a2 * c3 - a3 * c2) / ab;
    let qa = xb * xb + yb * yb - 1.0;
    let qb = 2.0 * (r1 + xa * xb + ya * yb);
    let qc = xa * xa + ya * ya - r1 * r1;
    let r = -(if qa.abs() > 1e-6 {
        (qb + (qb * qb - 4.0 * qa * qc).sqrt()) / (2.0 * qa)
    } else {
        qc / qb
    });
    Circle::new(x1 + xa + xb * r, y1 + ya + yb * r, r)
}

/// Loose fallback: centroid plus the farthest reach of any circle.
fn bounding_circle(circles: &[Circle]) -> Circle {
    let n = circles.len().max(1) as f64;
    let cx = circles.iter().map(|c| c.x).sum::<f64>() / n;
    let cy = circles.iter().map(|c| c.y).sum::<f64>() / n;
    let r = circles
        .iter()
        .map(|c| ((c.x - cx).powi(2) + (c.y - cy).powi(2)).sqrt() + c.r)
        .fold(0.0, f64::max);
    Circle::new(cx, cy, r)
}

/// Linear congruential generator (Numerical Recipes constants).
#[derive(Debug, Clone)]
pub struct Lcg(u64);

impl Default for Lcg {
    fn default() -> Self {
        Lcg(1)
    }
}

impl Lcg {
    const A: u64 = 1_664_525;
    const C: u64 = 1_013_904_223;
    const M: u64 = 1 << 32;

    pub fn next_f64(&mut self) -> f64 {
        self.0 = (Self::A * self.0 + Self::C) % Self::M;
        self.0 as f64 / Self::M as f64
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        let mut m = items.len();
        while m > 0 {
            let i = (self.next_f64() * m as f64) as usize;
            m -= 1;
            items.swap(m, i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn overlap(a: &Circle, b: &Circle) -> f64 {
        let d = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
        a.r + b.r - d
    }

    #[test]
    fn siblings_do_not_overlap() {
        let mut circles: Vec<Circle> = [5.0, 4.0, 3.0, 3.0, 2.0, 2.0, 1.5, 1.0, 1.0, 0.5]
            .iter()
            .map(|&r| Circle::new(0.0, 0.0, r))
            .collect();
        let e = pack_siblings(&mut circles, &mut Lcg::default());
        for i in 0..circles.len() {
            for j in i + 1..circles.len() {
                assert!(overlap(&circles[i], &circles[j]) < 1e-4, "{i} overlaps {j}");
            }
            let c = &circles[i];
            assert!((c.x * c.x + c.y * c.y).sqrt() + c.r <= e + 1e-4);
        }
    }

    #[test]
    fn two_siblings_sit_side_by_side() {
        let mut circles = vec![Circle::new(0.0, 0.0, 2.0), Circle::new(0.0, 0.0, 1.0)];
        let e = pack_siblings(&mut circles, &mut Lcg::default());
        assert!((e - 3.0).abs() < EPS);
        assert!((circles[0].x + 1.0).abs() < EPS);
        assert!((circles[1].x - 2.0).abs() < EPS);
    }

    #[test]
    fn enclose_single_and_pair() {
        let mut rng = Lcg::default();
        let one = enclose(&[Circle::new(1.0, 2.0, 3.0)], &mut rng);
        assert_eq!(one, Circle::new(1.0, 2.0, 3.0));

        let pair = enclose(&[Circle::new(-1.0, 0.0, 1.0), Circle::new(1.0, 0.0, 1.0)], &mut rng);
        assert!(pair.x.abs() < EPS);
        assert!((pair.r - 2.0).abs() < EPS);
    }

    #[test]
    fn root_fills_the_canvas() {
        let tree = TreeNode::dir(
            "root",
            vec![
                TreeNode::file("a", 10.0, 0.0),
                TreeNode::dir("d", vec![TreeNode::file("d/b", 4.0, 0.0), TreeNode::file("d/c", 1.0, 0.0)]),
            ],
        );
        let packed = pack(&tree, &PackConfig::default());
        let root = packed.root();
        assert_eq!((root.x, root.y, root.r), (466.0, 466.0, 466.0));
        assert_eq!(root.value, 15.0);
        assert_eq!(packed.len(), 5);
    }

    #[test]
    fn children_sorted_by_weight() {
        let tree = TreeNode::dir(
            "root",
            vec![
                TreeNode::file("small", 1.0, 0.0),
                TreeNode::file("large", 9.0, 0.0),
                TreeNode::file("medium", 4.0, 0.0),
            ],
        );
        let packed = pack(&tree, &PackConfig::default());
        let names: Vec<&str> = packed.root().children.iter().map(|c| packed.nodes[c.index()].name.as_str()).collect();
        assert_eq!(names, ["large", "medium", "small"]);
    }

    #[test]
    fn zero_sized_tree_does_not_produce_nan() {
        let tree = TreeNode::dir("root", vec![TreeNode::file("a", 0.0, 0.0), TreeNode::file("b", 0.0, 0.0)]);
        let packed = pack(&tree, &PackConfig { width: 100.0, padding: 0.0 });
        for n in &packed.nodes {
            assert!(n.x.is_finite() && n.y.is_finite() && n.r.is_finite());
            assert!(n.r >= 0.0);
        }
    }

    #[test]
    fn lcg_is_deterministic() {
        let mut a = Lcg::default();
        let mut b = Lcg::default();
        for _ in 0..10 {
            assert_eq!(a.next_f64(), b.next_f64());
        }
    }
}
