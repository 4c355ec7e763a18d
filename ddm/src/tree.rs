use crate::error::{Error, Result};
use serde::Serialize;
use std::borrow::Cow;
use std::ops::Index;

/// Handle to a node inside the [`Tree`] that created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in its tree's creation order (the root is 0).
    pub fn index(self) -> usize {
        self.0
    }
}

/// The three kinds of node a rooted tree is made of.
///
/// A root has no parent and no distance, a leaf has no children. Only the
/// fields that make sense for a kind are stored, so neither can be given to
/// the wrong kind of node.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Root {
        children: Vec<NodeId>,
    },
    Internal {
        parent: NodeId,
        distance: f64,
        children: Vec<NodeId>,
    },
    Leaf {
        parent: NodeId,
        distance: f64,
    },
}

/// A node in a rooted (not necessarily bifurcating) tree.
/// The distance is the length of the branch to the parent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TreeNode {
    name: String,
    #[serde(flatten)]
    kind: NodeKind,
}

impl TreeNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self.kind {
            NodeKind::Root { .. } => None,
            NodeKind::Internal { parent, .. } | NodeKind::Leaf { parent, .. } => Some(parent),
        }
    }

    /// Branch length to the parent; always 0 for the root.
    pub fn distance(&self) -> f64 {
        match self.kind {
            NodeKind::Root { .. } => 0.0,
            NodeKind::Internal { distance, .. } | NodeKind::Leaf { distance, .. } => distance,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Root { children } | NodeKind::Internal { children, .. } => children,
            NodeKind::Leaf { .. } => &[],
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, NodeKind::Root { .. })
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }
}

/// A rooted tree stored as an arena of nodes.
///
/// The root is created with the tree. Every other node is created through
/// [`Tree::create_node`] or [`Tree::create_leaf`], which attach it to an
/// existing parent, so all nodes are always reachable from the root. Leaves
/// are kept in creation order, which is the order distance matrices use.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Tree {
    name: String,
    nodes: Vec<TreeNode>,
    leaves: Vec<NodeId>,
    leaf_names: Vec<String>,
}

impl Tree {
    /// Creates a tree containing only a root node.
    pub fn new(name: impl Into<String>, root_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: vec![TreeNode {
                name: root_name.into(),
                kind: NodeKind::Root {
                    children: Vec::new(),
                },
            }],
            leaves: Vec::new(),
            leaf_names: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always has its root, so it is empty when that is all it has.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Looks up a node, failing for handles that do not belong to this tree.
    pub fn get(&self, id: NodeId) -> Result<&TreeNode> {
        self.nodes.get(id.0).ok_or_else(|| {
            Error::structural(format!(
                "node {} does not belong to tree '{}'",
                id.0, self.name
            ))
        })
    }

    /// All non-root nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        (1..self.nodes.len()).map(NodeId)
    }

    pub fn leaves(&self) -> &[NodeId] {
        &self.leaves
    }

    /// Leaf names in leaf order.
    pub fn leaf_names(&self) -> &[String] {
        &self.leaf_names
    }

    /// Creates an internal node below `parent` and returns it.
    pub fn create_node(
        &mut self,
        name: impl Into<String>,
        parent: NodeId,
        distance: f64,
    ) -> Result<NodeId> {
        self.attach(
            name.into(),
            parent,
            NodeKind::Internal {
                parent,
                distance: check_distance(distance)?,
                children: Vec::new(),
            },
        )
    }

    /// Creates a leaf below `parent` and returns it.
    pub fn create_leaf(
        &mut self,
        name: impl Into<String>,
        parent: NodeId,
        distance: f64,
    ) -> Result<NodeId> {
        let name = name.into();
        let id = self.attach(
            name.clone(),
            parent,
            NodeKind::Leaf {
                parent,
                distance: check_distance(distance)?,
            },
        )?;
        self.leaves.push(id);
        self.leaf_names.push(name);
        Ok(id)
    }

    fn attach(&mut self, name: String, parent: NodeId, kind: NodeKind) -> Result<NodeId> {
        let id = NodeId(self.nodes.len());
        self.children_mut(parent)?.push(id);
        self.nodes.push(TreeNode { name, kind });
        Ok(id)
    }

    fn children_mut(&mut self, id: NodeId) -> Result<&mut Vec<NodeId>> {
        self.get(id)?;
        match &mut self.nodes[id.0].kind {
            NodeKind::Root { children } | NodeKind::Internal { children, .. } => Ok(children),
            NodeKind::Leaf { .. } => Err(Error::structural("a leaf can not be given children")),
        }
    }

    /// Renames a node, keeping the cached leaf names in step.
    pub fn set_node_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<()> {
        self.get(id)?;
        let name = name.into();
        if let Some(pos) = self.leaves.iter().position(|&leaf| leaf == id) {
            self.leaf_names[pos] = name.clone();
        }
        self.nodes[id.0].name = name;
        Ok(())
    }

    /// Sets the branch length of a node. Only zero is accepted for the root.
    pub fn set_distance(&mut self, id: NodeId, value: f64) -> Result<()> {
        self.get(id)?;
        let value = check_distance(value)?;
        match &mut self.nodes[id.0].kind {
            NodeKind::Root { .. } if value != 0.0 => Err(Error::structural(
                "a root can not have a non-zero distance",
            )),
            NodeKind::Root { .. } => Ok(()),
            NodeKind::Internal { distance, .. } | NodeKind::Leaf { distance, .. } => {
                *distance = value;
                Ok(())
            }
        }
    }

    /// Moves `child` (and its subtree) below `new_parent`.
    pub fn set_parent(&mut self, child: NodeId, new_parent: NodeId) -> Result<()> {
        let node = self.get(child)?;
        let old_parent = node
            .parent()
            .ok_or_else(|| Error::structural("a root can not have a parent"))?;
        if self.get(new_parent)?.is_leaf() {
            return Err(Error::structural(format!(
                "leaf '{}' can not be given children",
                self.nodes[new_parent.0].name
            )));
        }
        if new_parent == child || self.ancestors(new_parent).any(|a| a == child) {
            return Err(Error::structural(format!(
                "moving '{}' below '{}' would create a cycle",
                self.nodes[child.0].name, self.nodes[new_parent.0].name
            )));
        }
        if old_parent == new_parent {
            return Ok(());
        }

        self.children_mut(old_parent)?.retain(|&c| c != child);
        self.children_mut(new_parent)?.push(child);
        match &mut self.nodes[child.0].kind {
            NodeKind::Internal { parent, .. } | NodeKind::Leaf { parent, .. } => {
                *parent = new_parent
            }
            NodeKind::Root { .. } => unreachable!("checked above"),
        }
        Ok(())
    }

    /// `None` for the root, and for handles this tree never handed out.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(TreeNode::parent)
    }

    /// Empty for leaves, and for handles this tree never handed out.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id.0).map_or(&[][..], TreeNode::children)
    }

    /// Walks from the parent of `id` up to the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent(id),
        }
    }

    /// Number of edges between the node and the root.
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// Sum of branch lengths between the node and the root.
    ///
    /// Like the other queries, this treats a handle the tree never handed out
    /// as a detached node instead of panicking; use [`Tree::get`] to reject
    /// such handles.
    pub fn root_distance(&self, id: NodeId) -> f64 {
        let mut total = self.nodes.get(id.0).map_or(0.0, TreeNode::distance);
        for ancestor in self.ancestors(id) {
            total += self[ancestor].distance();
        }
        total
    }

    /// Longest number of edges from the node down to a leaf below it.
    /// Recomputed on every call, so it follows [`Tree::set_parent`].
    pub fn height_of(&self, id: NodeId) -> usize {
        let mut height = 0;
        let mut stack = vec![(id, 0)];
        while let Some((node, level)) = stack.pop() {
            height = height.max(level);
            stack.extend(self.children(node).iter().map(|&c| (c, level + 1)));
        }
        height
    }

    pub fn height(&self) -> usize {
        self.height_of(self.root())
    }

    /// Exports the tree in Newick format.
    ///
    /// Branch lengths are written only when at least one of them is non-zero,
    /// so topology-only trees come out as topology-only strings. If
    /// `hide_internal` is true, internal node names (including the root's)
    /// are omitted from the output.
    pub fn to_newick(&self, hide_internal: bool) -> String {
        let with_lengths = self.nodes().any(|id| self[id].distance() != 0.0);
        format!(
            "{};",
            self.newick_subtree(self.root(), hide_internal, with_lengths)
        )
    }

    fn newick_subtree(&self, id: NodeId, hide_internal: bool, with_lengths: bool) -> String {
        let node = &self[id];
        let mut out = if node.is_leaf() {
            newick_label(&node.name).into_owned()
        } else {
            let inner: Vec<String> = node
                .children()
                .iter()
                .map(|&c| self.newick_subtree(c, hide_internal, with_lengths))
                .collect();
            let name = if hide_internal {
                Cow::Borrowed("")
            } else {
                newick_label(&node.name)
            };
            format!("({}){}", inner.join(","), name)
        };
        if with_lengths && !node.is_root() {
            out.push_str(&format!(":{}", node.distance()));
        }
        out
    }
}

impl Index<NodeId> for Tree {
    type Output = TreeNode;

    /// # Panics
    /// Panics if the handle was created by a different, larger tree.
    fn index(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }
}

/// Iterator over the ancestors of a node, nearest first.
#[derive(Debug)]
pub struct Ancestors<'a> {
    tree: &'a Tree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

/// Single-quotes a name that would not survive as a bare Newick label, such
/// as the `A (1)` names given to duplicates. Quotes inside are doubled.
fn newick_label(name: &str) -> Cow<'_, str> {
    let bare = !name.contains(&['(', ')', ',', ':', ';', '\''][..]) && name.trim() == name;
    if bare {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("'{}'", name.replace('\'', "''")))
    }
}

fn check_distance(distance: f64) -> Result<f64> {
    if distance.is_finite() && distance >= 0.0 {
        Ok(distance)
    } else {
        Err(Error::structural(format!(
            "branch length must be a finite non-negative number, got {distance}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root -> node_1 (1.0) -> node_2 (2.0) -> leaf (0.5), plus a leaf at the root
    fn chain() -> (Tree, NodeId, NodeId, NodeId) {
        let mut tree = Tree::new("chain", "root");
        let root = tree.root();
        let n1 = tree.create_node("node_1", root, 1.0).unwrap();
        let n2 = tree.create_node("node_2", n1, 2.0).unwrap();
        let leaf = tree.create_leaf("leaf", n2, 0.5).unwrap();
        tree.create_leaf("other", root, 3.0).unwrap();
        (tree, n1, n2, leaf)
    }

    #[test]
    fn test_depth_height_and_root_distance() {
        let (tree, n1, n2, leaf) = chain();
        assert_eq!(tree.depth(tree.root()), 0);
        assert_eq!(tree.depth(n2), 2);
        assert_eq!(tree.depth(leaf), 3);
        assert_eq!(tree.height(), 3);
        assert_eq!(tree.height_of(n1), 2);
        assert_eq!(tree.height_of(leaf), 0);
        assert!((tree.root_distance(n2) - 3.0).abs() < 1e-12);
        assert!((tree.root_distance(leaf) - 3.5).abs() < 1e-12);
        assert_eq!(tree.root_distance(tree.root()), 0.0);
    }

    #[test]
    fn test_nodes_and_leaves_in_creation_order() {
        let (tree, n1, n2, leaf) = chain();
        let nodes: Vec<NodeId> = tree.nodes().collect();
        assert_eq!(nodes[..3], [n1, n2, leaf]);
        assert_eq!(nodes.len(), 4);
        assert_eq!(tree.leaf_names(), ["leaf", "other"]);
        assert_eq!(tree.children(tree.root()).len(), 2);
        assert!(!tree.is_empty());
        assert!(Tree::new("t", "r").is_empty());
    }

    #[test]
    fn test_leaf_can_not_be_given_children() {
        let (mut tree, _, _, leaf) = chain();
        let err = tree.create_node("child", leaf, 0.0).unwrap_err();
        assert!(matches!(err, Error::StructuralViolation(_)));
        assert!(tree.create_leaf("child", leaf, 0.0).is_err());
        // the failed calls must not leave half-created nodes behind
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_root_can_not_have_parent_or_distance() {
        let (mut tree, n1, _, _) = chain();
        let root = tree.root();
        assert!(matches!(
            tree.set_parent(root, n1),
            Err(Error::StructuralViolation(_))
        ));
        assert!(matches!(
            tree.set_distance(root, 1.0),
            Err(Error::StructuralViolation(_))
        ));
        assert!(tree.set_distance(root, 0.0).is_ok());
    }

    #[test]
    fn test_invalid_distances_are_rejected() {
        let mut tree = Tree::new("t", "r");
        let root = tree.root();
        assert!(tree.create_leaf("a", root, -1.0).is_err());
        assert!(tree.create_leaf("a", root, f64::NAN).is_err());
        assert!(tree.leaves().is_empty());
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let (big, _, _, leaf) = chain();
        let mut small = Tree::new("small", "root");
        assert!(big.get(leaf).is_ok());
        assert!(small.create_leaf("x", leaf, 0.0).is_err());
    }

    #[test]
    fn test_queries_on_unknown_handle_do_not_panic() {
        let (big, _, _, leaf) = chain();
        let small = Tree::new("small", "root");
        assert!(small.get(leaf).is_err());
        assert_eq!(small.parent(leaf), None);
        assert!(small.children(leaf).is_empty());
        assert_eq!(small.ancestors(leaf).count(), 0);
        assert_eq!(small.depth(leaf), 0);
        assert_eq!(small.height_of(leaf), 0);
        assert_eq!(small.root_distance(leaf), 0.0);
        assert_eq!(big.depth(leaf), 3);
    }

    #[test]
    fn test_set_parent_moves_subtree_and_heights_follow() {
        let (mut tree, n1, n2, leaf) = chain();
        let root = tree.root();
        tree.set_parent(n2, root).unwrap();
        assert_eq!(tree.parent(n2), Some(root));
        assert!(tree.children(n1).is_empty());
        assert!(tree.children(root).contains(&n2));
        assert_eq!(tree.depth(leaf), 2);
        assert_eq!(tree.height_of(n1), 0);
        assert_eq!(tree.height(), 2);
    }

    #[test]
    fn test_set_parent_rejects_cycles_and_leaf_parents() {
        let (mut tree, n1, n2, leaf) = chain();
        assert!(tree.set_parent(n1, n2).is_err());
        assert!(tree.set_parent(n1, n1).is_err());
        assert!(tree.set_parent(n2, leaf).is_err());
        assert_eq!(tree.parent(n2), Some(n1));
    }

    #[test]
    fn test_set_node_name_updates_leaf_names() {
        let (mut tree, _, _, leaf) = chain();
        tree.set_node_name(leaf, "renamed").unwrap();
        assert_eq!(tree[leaf].name(), "renamed");
        assert_eq!(tree.leaf_names()[0], "renamed");
    }

    #[test]
    fn test_to_newick_produces_valid_format() {
        let mut tree = Tree::new("t", "root");
        let root = tree.root();
        let inner = tree.create_node("inner", root, 0.25).unwrap();
        tree.create_leaf("L", inner, 0.5).unwrap();
        tree.create_leaf("R", inner, 1.0).unwrap();
        tree.create_leaf("S", root, 2.0).unwrap();
        assert_eq!(tree.to_newick(true), "((L:0.5,R:1):0.25,S:2);");
        assert_eq!(tree.to_newick(false), "((L:0.5,R:1)inner:0.25,S:2)root;");
    }

    #[test]
    fn test_to_newick_quotes_names_with_punctuation() {
        let mut tree = Tree::new("t", "root (1)");
        let root = tree.root();
        let inner = tree.create_node("x:y", root, 0.0).unwrap();
        tree.create_leaf("A (1)", inner, 0.0).unwrap();
        tree.create_leaf("it's", inner, 0.0).unwrap();
        tree.create_leaf("plain name", root, 0.0).unwrap();
        assert_eq!(tree.to_newick(true), "(('A (1)','it''s'),plain name);");
        assert_eq!(
            tree.to_newick(false),
            "(('A (1)','it''s')'x:y',plain name)'root (1)';"
        );
    }

    #[test]
    fn test_to_newick_without_lengths() {
        let mut tree = Tree::new("t", "root");
        let root = tree.root();
        let inner = tree.create_node("n", root, 0.0).unwrap();
        tree.create_leaf("A", inner, 0.0).unwrap();
        tree.create_leaf("B", inner, 0.0).unwrap();
        tree.create_leaf("C", root, 0.0).unwrap();
        assert_eq!(tree.to_newick(true), "((A,B),C);");
    }
}
