use serde::{Deserialize, Serialize};

/// Handle to a node of one particular [`PackedTree`].
///
/// Every packing gets a fresh generation, so an id kept across a rebuild no
/// longer resolves instead of silently pointing at another node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    slot: u32,
    generation: u32,
}

impl NodeId {
    pub fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    pub fn index(self) -> usize {
        self.slot as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Dir,
}

/// One entry of the source tree as published by the metrics backend.
///
/// Leaves carry `size` (complexity) and `changes`; directories only carry
/// `name` and `children`. Any `size` declared on a directory is ignored by
/// the layout, which sums its leaves instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub changes: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_file: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn dir(name: impl Into<String>, children: Vec<TreeNode>) -> Self {
        Self {
            name: name.into(),
            is_file: Some(false),
            children,
            ..Self::default()
        }
    }

    pub fn file(path: impl Into<String>, size: f64, changes: f64) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            name,
            path,
            size,
            changes,
            is_file: Some(true),
            ..Self::default()
        }
    }

    /// Backends older than the `is_file` flag only mark files by having a
    /// path and no children.
    pub fn is_file(&self) -> bool {
        self.is_file
            .unwrap_or(self.children.is_empty() && !self.path.is_empty())
    }

    pub fn kind(&self) -> NodeKind {
        if self.is_file() {
            NodeKind::File
        } else {
            NodeKind::Dir
        }
    }

    /// A `{}` tree is what the backend sends before the first scan finished.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.path.is_empty() && self.children.is_empty()
    }

    pub fn find_leaf(&self, path: &str) -> Option<&TreeNode> {
        if self.children.is_empty() {
            return (self.path == path).then_some(self);
        }
        self.children.iter().find_map(|c| c.find_leaf(path))
    }

    pub fn leaf_count(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(TreeNode::leaf_count).sum()
        }
    }
}

/// The payload of the source-tree metrics endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeDataset {
    #[serde(default)]
    pub tree: Option<TreeNode>,
    #[serde(default)]
    pub min_changes: f64,
    #[serde(default)]
    pub max_changes: f64,
    #[serde(default)]
    pub min_complexity: f64,
    #[serde(default)]
    pub max_complexity: f64,
}

impl TreeDataset {
    pub fn new(tree: TreeNode, min_changes: f64, max_changes: f64) -> Self {
        Self {
            tree: Some(tree),
            min_changes,
            max_changes,
            ..Self::default()
        }
    }

    pub fn from_json(text: &str) -> crate::Result<Self> {
        // The backend answers `null` or `[]` when a project has no metrics yet.
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_value(value)?)
    }

    /// The tree to lay out, if there is anything to draw at all.
    pub fn root(&self) -> Option<&TreeNode> {
        self.tree.as_ref().filter(|t| !t.is_empty())
    }
}

/// A tree node annotated with its circle in layout coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackedNode {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub depth: u32,
    pub x: f64,
    pub y: f64,
    pub r: f64,
    /// Summed leaf size of the subtree.
    pub value: f64,
    pub name: String,
    pub path: String,
    pub changes: f64,
    pub kind: NodeKind,
    pub repo_link: Option<String>,
}

impl PackedNode {
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// Last segment of the path, which is what the diagram prints.
    pub fn label(&self) -> &str {
        if self.path.is_empty() {
            return &self.name;
        }
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PackedTree {
    pub root: NodeId,
    pub generation: u32,
    pub nodes: Vec<PackedNode>,
}

impl PackedTree {
    /// Resolves `id`, rejecting ids handed out by an earlier packing.
    pub fn get(&self, id: NodeId) -> Option<&PackedNode> {
        if id.generation() != self.generation {
            return None;
        }
        self.nodes.get(id.index())
    }

    pub fn root(&self) -> &PackedNode {
        &self.nodes[self.root.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in pre-order, root first.
    pub fn descendants(&self) -> impl Iterator<Item = &PackedNode> {
        self.nodes.iter()
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = &PackedNode> {
        std::iter::successors(self.get(id), move |n| n.parent.and_then(|p| self.get(p)))
    }

    pub fn find_by_path(&self, path: &str) -> Option<&PackedNode> {
        self.nodes.iter().find(|n| n.path == path)
    }
}
