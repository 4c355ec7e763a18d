//! Leaf-to-leaf distance matrices.
//!
//! The distance between two leaves is measured through their lowest common
//! ancestor, either as a number of edges or as the sum of branch lengths.
//! Every leaf keeps the list of its ancestors ordered from its parent up to
//! the root, so a pair costs one walk up the first leaf's list. Expect
//! `O(leaves^2 * depth)` work, which is fine for the few hundred leaves of a
//! typical tree comparison.

use crate::matrix::DistMat;
use crate::tree::{NodeId, Tree};
use log::debug;
use std::collections::HashMap;

/// Ancestors of one leaf, nearest first, with the distance from the leaf.
struct Lineage {
    path: Vec<(NodeId, f64)>,
    lookup: HashMap<NodeId, f64>,
}

impl Lineage {
    fn of(tree: &Tree, leaf: NodeId, use_distance: bool) -> Self {
        let mut path = Vec::with_capacity(tree.depth(leaf));
        let mut below = leaf;
        let mut total = 0.0;
        for ancestor in tree.ancestors(leaf) {
            total += if use_distance {
                tree[below].distance()
            } else {
                1.0
            };
            path.push((ancestor, total));
            below = ancestor;
        }
        let lookup = path.iter().copied().collect();
        Self { path, lookup }
    }

    /// Distance between the two leaves through their first shared ancestor.
    fn meet(&self, other: &Lineage) -> Option<f64> {
        self.path
            .iter()
            .find_map(|(node, d)| other.lookup.get(node).map(|o| d + o))
    }
}

/// Builds the symmetric leaf distance matrix of `tree`.
///
/// Rows follow [`Tree::leaves`] and are labeled with the leaf names. With
/// `use_distance` the branch lengths are summed, otherwise every edge counts
/// as 1. The diagonal is 0, or `+inf` when `inf_diagonal` is set so that a
/// leaf never comes out as its own nearest neighbour.
pub fn base_distance_matrix(tree: &Tree, use_distance: bool, inf_diagonal: bool) -> DistMat {
    let lineages: Vec<Lineage> = tree
        .leaves()
        .iter()
        .map(|&leaf| Lineage::of(tree, leaf, use_distance))
        .collect();
    let n = lineages.len();
    let mut dist = DistMat::empty_with_labels(tree.leaf_names().to_vec());

    let diagonal = if inf_diagonal { f64::INFINITY } else { 0.0 };
    (0..n).for_each(|i| {
        dist.set(i, i, Some(diagonal));
        (0..i).for_each(|j| dist.set(i, j, lineages[i].meet(&lineages[j])));
    });

    debug!(
        "built {n}x{n} {} matrix for tree '{}'",
        if use_distance { "distance" } else { "topology" },
        tree.name()
    );
    dist
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(newick: &str) -> Tree {
        Tree::from_newick("t", newick).unwrap()
    }

    #[test]
    fn test_branch_length_distances() {
        let tree = parse("((A:1,B:2):5,(C:3,D:4):6);");
        let m = base_distance_matrix(&tree, true, false);
        assert_eq!(m.labels(), ["A", "B", "C", "D"]);
        assert_eq!(m.get(0, 1), Some(3.0));
        assert_eq!(m.get(0, 2), Some(15.0));
        assert_eq!(m.get(1, 3), Some(17.0));
        assert_eq!(m.get(2, 3), Some(7.0));
        assert!(m.is_symmetric());
        assert!((0..4).all(|i| m.get(i, i) == Some(0.0)));
    }

    #[test]
    fn test_topology_distances() {
        let tree = parse("((A:1,B:2):5,(C:3,D:4):6);");
        let m = base_distance_matrix(&tree, false, false);
        assert_eq!(m.get(0, 1), Some(2.0));
        assert_eq!(m.get(0, 2), Some(4.0));
        assert_eq!(m.get(3, 2), Some(2.0));
    }

    #[test]
    fn test_uneven_depths() {
        let tree = parse("(A,(B,(C,D)));");
        let m = base_distance_matrix(&tree, false, false);
        assert_eq!(m.get(0, 1), Some(3.0));
        assert_eq!(m.get(0, 3), Some(4.0));
        assert_eq!(m.get(1, 2), Some(3.0));
        assert_eq!(m.get(2, 3), Some(2.0));
    }

    #[test]
    fn test_infinite_diagonal() {
        let tree = parse("(A:1,B:1);");
        let m = base_distance_matrix(&tree, true, true);
        assert_eq!(m.get(0, 0), Some(f64::INFINITY));
        assert_eq!(m.get(1, 1), Some(f64::INFINITY));
        assert_eq!(m.get(0, 1), Some(2.0));
    }

    #[test]
    fn test_leaf_under_root() {
        let tree = parse("A;");
        let m = base_distance_matrix(&tree, false, false);
        assert_eq!(m.dim(), 1);
        assert_eq!(m.get(0, 0), Some(0.0));
    }

    #[test]
    fn test_follows_reparenting() {
        let mut tree = parse("((A,B)X,C);");
        let x = tree.nodes().find(|&id| tree[id].name() == "X").unwrap();
        let c = tree.leaves()[2];
        tree.set_parent(c, x).unwrap();
        let m = base_distance_matrix(&tree, false, false);
        assert_eq!(m.get(0, 2), Some(2.0));
    }
}
