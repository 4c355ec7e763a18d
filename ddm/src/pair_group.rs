//! Pair-group clustering of tree leaves.
//!
//! Starting from the leaf distance matrix of a tree, the two closest clusters
//! are merged over and over until two are left, which then hang from the
//! root. How the distance of a merged cluster to the others is derived is set
//! by the [`Linkage`]. The result is a new tree whose shape only reflects the
//! merge order; all of its branch lengths are zero.
//!
//! Clusters live in slots of a `(2n - 1)`-wide working matrix: the first `n`
//! slots are the leaves, every merge appends one slot, and a bit mask marks
//! the slots that are still in play. Candidate pairs are scanned as `(i, j)`
//! with `j < i`, both ascending, and the last pair at the minimum distance
//! wins ties.

use crate::distance::base_distance_matrix;
use crate::error::{Error, Result};
use crate::matrix::DistMat;
use crate::tree::{NodeId, Tree};
use bitvec::prelude::*;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name given to every pair-group tree.
pub const PAIR_GROUP_TREE_NAME: &str = "PGM";
/// Name of the root of a pair-group tree.
pub const PAIR_GROUP_ROOT_NAME: &str = "Root";

/// How the distance between a merged cluster and the rest is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    /// Shortest distance of either half.
    Min,
    /// Longest distance of either half.
    Max,
    /// Mean distance over all merged leaves.
    Average,
}

impl Linkage {
    pub const ALL: [Linkage; 3] = [Linkage::Min, Linkage::Max, Linkage::Average];

    pub fn as_str(&self) -> &'static str {
        match self {
            Linkage::Min => "min",
            Linkage::Max => "max",
            Linkage::Average => "average",
        }
    }

    /// Merges the distance rows of two clusters of `size_a` and `size_b`
    /// leaves into the row of their union.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if the rows differ in length.
    pub fn combine(&self, a: &[f64], b: &[f64], size_a: usize, size_b: usize) -> Result<Vec<f64>> {
        if a.len() != b.len() {
            return Err(Error::DimensionMismatch {
                expected: a.len(),
                found: b.len(),
            });
        }
        let (wa, wb) = (size_a as f64, size_b as f64);
        Ok(a.iter()
            .zip(b)
            .map(|(&x, &y)| match self {
                Linkage::Min => x.min(y),
                Linkage::Max => x.max(y),
                Linkage::Average => (x * wa + y * wb) / (wa + wb),
            })
            .collect())
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Linkage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Linkage::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| Error::unsupported("linkage", s))
    }
}

/// Working state of the clustering.
struct Clusters {
    width: usize,
    dist: Vec<f64>,
    active: BitVec<u8, Lsb0>,
    sizes: Vec<usize>,
    nodes: Vec<NodeId>,
}

impl Clusters {
    fn new(matrix: &DistMat, leaves: Vec<NodeId>) -> Self {
        let n = matrix.dim();
        let width = 2 * n - 1;
        let mut dist = vec![f64::INFINITY; width * width];
        (0..n).for_each(|i| {
            (0..n).for_each(|j| {
                if let Some(d) = matrix.get(i, j) {
                    dist[i * width + j] = d;
                }
            })
        });
        let mut active = BitVec::repeat(false, width);
        active[..n].fill(true);
        Self {
            width,
            dist,
            active,
            sizes: vec![1; n],
            nodes: leaves,
        }
    }

    fn get(&self, i: usize, j: usize) -> f64 {
        self.dist[i * self.width + j]
    }

    fn row(&self, i: usize) -> &[f64] {
        &self.dist[i * self.width..(i + 1) * self.width]
    }

    /// Closest pair of active slots as `(i, j, d)` with `j < i`.
    fn select_min_pair(&self) -> Option<(usize, usize, f64)> {
        self.active
            .iter_ones()
            .flat_map(|i| {
                self.active
                    .iter_ones()
                    .take_while(move |&j| j < i)
                    .map(move |j| (i, j, self.get(i, j)))
            })
            .fold(None, |best, candidate| match best {
                Some((_, _, d)) if candidate.2 > d => best,
                _ => Some(candidate),
            })
    }

    /// Retires slots `i` and `j` and fills a new slot with their combined
    /// distances. Returns the new slot.
    fn merge(&mut self, i: usize, j: usize, linkage: Linkage, node: NodeId) -> Result<usize> {
        let row = linkage.combine(self.row(i), self.row(j), self.sizes[i], self.sizes[j])?;
        self.active.set(i, false);
        self.active.set(j, false);

        let slot = self.sizes.len();
        let width = self.width;
        for k in self.active.iter_ones() {
            self.dist[slot * width + k] = row[k];
            self.dist[k * width + slot] = row[k];
        }
        self.active.set(slot, true);
        self.sizes.push(self.sizes[i] + self.sizes[j]);
        self.nodes.push(node);
        Ok(slot)
    }
}

/// Clusters the leaves of `tree` by their branch-length distances.
pub fn pair_group_tree(tree: &Tree, linkage: Linkage) -> Result<Tree> {
    pair_group_tree_from_matrix(&base_distance_matrix(tree, true, true), linkage)
}

/// Clusters the labels of a distance matrix. Cells without a value are
/// treated as infinitely far apart.
///
/// The tree gets one leaf per label, one internal node `"node K"` for the
/// K-th merge and the root, which holds the two clusters left at the end.
pub fn pair_group_tree_from_matrix(matrix: &DistMat, linkage: Linkage) -> Result<Tree> {
    let mut pgm = Tree::new(PAIR_GROUP_TREE_NAME, PAIR_GROUP_ROOT_NAME);
    let root = pgm.root();
    let leaves = matrix
        .labels()
        .iter()
        .map(|label| pgm.create_leaf(label.as_str(), root, 0.0))
        .collect::<Result<Vec<_>>>()?;
    if leaves.len() < 2 {
        return Ok(pgm);
    }

    let mut clusters = Clusters::new(matrix, leaves);
    for k in 1..matrix.dim() - 1 {
        let (i, j, d) = clusters
            .select_min_pair()
            .ok_or_else(|| Error::structural("no clusters left to merge"))?;
        let node = pgm.create_node(format!("node {k}"), root, 0.0)?;
        pgm.set_parent(clusters.nodes[j], node)?;
        pgm.set_parent(clusters.nodes[i], node)?;
        clusters.merge(i, j, linkage, node)?;
        debug!(
            "{linkage} linkage merge {k}: '{}' + '{}' at {d}",
            pgm[clusters.nodes[j]].name(),
            pgm[clusters.nodes[i]].name()
        );
    }

    // the two clusters left were never moved off the root
    Ok(pgm)
}

/// Topological leaf distances of the pair-group tree of `tree`.
pub fn pair_group_matrix(tree: &Tree, linkage: Linkage) -> Result<DistMat> {
    Ok(base_distance_matrix(
        &pair_group_tree(tree, linkage)?,
        false,
        false,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn square(names: &[&str], rows: &[&[f64]]) -> DistMat {
        DistMat::from_rows(
            labels(names),
            rows.iter()
                .map(|r| r.iter().map(|&x| Some(x)).collect())
                .collect(),
        )
        .unwrap()
    }

    /// AB = 1, AC = 2, CD = 3, every other pair 10
    fn chained() -> DistMat {
        square(
            &["A", "B", "C", "D"],
            &[
                &[0.0, 1.0, 2.0, 10.0],
                &[1.0, 0.0, 10.0, 10.0],
                &[2.0, 10.0, 0.0, 3.0],
                &[10.0, 10.0, 3.0, 0.0],
            ],
        )
    }

    #[test]
    fn test_linkage_from_str() {
        assert_eq!("min".parse::<Linkage>().unwrap(), Linkage::Min);
        assert_eq!("max".parse::<Linkage>().unwrap(), Linkage::Max);
        assert_eq!("average".parse::<Linkage>().unwrap(), Linkage::Average);
        assert_eq!(
            "median".parse::<Linkage>().unwrap_err(),
            Error::UnsupportedMode {
                kind: "linkage",
                value: "median".into()
            }
        );
    }

    #[test]
    fn test_combine_rows() {
        let a = [2.0, 4.0];
        let b = [6.0, 1.0];
        assert_eq!(Linkage::Min.combine(&a, &b, 1, 1).unwrap(), vec![2.0, 1.0]);
        assert_eq!(Linkage::Max.combine(&a, &b, 1, 1).unwrap(), vec![6.0, 4.0]);
        assert_eq!(
            Linkage::Average.combine(&a, &b, 1, 3).unwrap(),
            vec![5.0, 1.75]
        );
        assert_eq!(
            Linkage::Min.combine(&a, &[1.0], 1, 1).unwrap_err(),
            Error::DimensionMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_node_counts_and_leaf_set() {
        let tree =
            Tree::from_newick("t", "((A:1,B:2):5,((C:3,D:4):1,E:2):6,F:9);").unwrap();
        for linkage in Linkage::ALL {
            let pgm = pair_group_tree(&tree, linkage).unwrap();
            assert_eq!(pgm.name(), PAIR_GROUP_TREE_NAME);
            assert_eq!(pgm[pgm.root()].name(), PAIR_GROUP_ROOT_NAME);
            // 6 leaves, 4 merges, the root
            assert_eq!(pgm.len(), 11);
            assert_eq!(pgm.leaf_names(), tree.leaf_names());
            assert_eq!(pgm.children(pgm.root()).len(), 2);
            assert!(pgm.nodes().all(|id| pgm[id].distance() == 0.0));
        }
    }

    #[test]
    fn test_min_linkage_on_two_cherries() {
        let tree = Tree::from_newick("t", "((A:1,B:2):5,(C:3,D:4):6);").unwrap();
        let pgm = pair_group_tree(&tree, Linkage::Min).unwrap();
        assert_eq!(pgm.to_newick(true), "((A,B),(C,D));");
        assert_eq!(pgm.to_newick(false), "((A,B)node 1,(C,D)node 2)Root;");

        let m = pair_group_matrix(&tree, Linkage::Min).unwrap();
        assert_eq!(m.labels(), ["A", "B", "C", "D"]);
        assert_eq!(m.get(0, 1), Some(2.0));
        assert_eq!(m.get(0, 2), Some(4.0));
        assert_eq!(m.get(2, 3), Some(2.0));
    }

    #[test]
    fn test_linkage_changes_merge_order() {
        let m = chained();
        let min = pair_group_tree_from_matrix(&m, Linkage::Min).unwrap();
        assert_eq!(min.to_newick(true), "(D,(C,(A,B)));");
        let max = pair_group_tree_from_matrix(&m, Linkage::Max).unwrap();
        assert_eq!(max.to_newick(true), "((A,B),(C,D));");
    }

    #[test]
    fn test_average_linkage_merge_order() {
        let m = square(
            &["A", "B", "C", "D"],
            &[
                &[0.0, 1.0, 4.0, 7.0],
                &[1.0, 0.0, 8.0, 7.0],
                &[4.0, 8.0, 0.0, 6.5],
                &[7.0, 7.0, 6.5, 0.0],
            ],
        );
        // (A,B) is 6 from C and 7 from D, C and D are 6.5 apart
        let pgm = pair_group_tree_from_matrix(&m, Linkage::Average).unwrap();
        assert_eq!(pgm.to_newick(true), "(D,(C,(A,B)));");
    }

    #[test]
    fn test_average_linkage_weights_by_cluster_size() {
        let m = square(
            &["A", "B", "C", "D", "E"],
            &[
                &[0.0, 1.0, 2.0, 10.0, 20.0],
                &[1.0, 0.0, 2.0, 10.0, 20.0],
                &[2.0, 2.0, 0.0, 4.0, 20.0],
                &[10.0, 10.0, 4.0, 0.0, 7.5],
                &[20.0, 20.0, 20.0, 7.5, 0.0],
            ],
        );
        // ((A,B),C) to D is (2 * 10 + 4) / 3 = 8, not (10 + 4) / 2 = 7, so D
        // joins E at 7.5 first
        let pgm = pair_group_tree_from_matrix(&m, Linkage::Average).unwrap();
        assert_eq!(pgm.to_newick(true), "((C,(A,B)),(D,E));");
    }

    #[test]
    fn test_ties_pick_last_pair() {
        let tree = Tree::from_newick("t", "(A:1,B:1,C:1,D:5);").unwrap();
        let pgm = pair_group_tree(&tree, Linkage::Min).unwrap();
        // AB, AC and BC are all 2 apart; (C, B) is scanned last
        assert_eq!(pgm.to_newick(true), "(D,(A,(B,C)));");
    }

    #[test]
    fn test_small_inputs() {
        let one = Tree::from_newick("t", "A;").unwrap();
        let pgm = pair_group_tree(&one, Linkage::Average).unwrap();
        assert_eq!(pgm.leaf_names(), ["A"]);
        assert_eq!(pgm.len(), 2);

        let two = Tree::from_newick("t", "(A:1,B:2);").unwrap();
        let pgm = pair_group_tree(&two, Linkage::Max).unwrap();
        assert_eq!(pgm.to_newick(true), "(A,B);");
    }

    #[test]
    fn test_missing_cells_never_merge_first() {
        let m = DistMat::from_rows(
            labels(&["A", "B", "C"]),
            vec![
                vec![Some(0.0), None, Some(4.0)],
                vec![None, Some(0.0), Some(1.0)],
                vec![Some(4.0), Some(1.0), Some(0.0)],
            ],
        )
        .unwrap();
        let pgm = pair_group_tree_from_matrix(&m, Linkage::Min).unwrap();
        assert_eq!(pgm.to_newick(true), "(A,(B,C));");
    }
}
