use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use crate::model::{NodeId, PackedTree};

/// Nodes whose path (or name, for directories without one) matches `query`,
/// best first. An exact path match always ranks first.
pub fn find(tree: &PackedTree, query: &str, limit: usize) -> Vec<NodeId> {
    let matcher = SkimMatcherV2::default();
    let mut hits: Vec<(i64, NodeId)> = tree
        .nodes
        .iter()
        .filter(|n| n.id != tree.root)
        .filter_map(|n| {
            let hay = if n.path.is_empty() { &n.name } else { &n.path };
            if hay == query {
                return Some((i64::MAX, n.id));
            }
            matcher.fuzzy_match(hay, query).map(|score| (score, n.id))
        })
        .collect();
    hits.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    hits.into_iter().take(limit).map(|(_, id)| id).collect()
}
