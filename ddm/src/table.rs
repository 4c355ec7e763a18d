//! One parsed tree together with the matrices derived from it.

use crate::config::{MatrixSource, MatrixType};
use crate::distance::base_distance_matrix;
use crate::error::Result;
use crate::matrix::DistMat;
use crate::pair_group::{pair_group_tree, Linkage};
use crate::tree::Tree;
use log::debug;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// A pair-group tree and its topological distance matrix.
#[derive(Clone, Debug)]
struct PairGroup {
    tree: Tree,
    matrix: DistMat,
}

/// Owns a tree and computes its distance matrices on first use.
///
/// Each matrix is built at most once; later calls hand out the stored copy.
#[derive(Clone, Debug)]
pub struct TreeTable {
    tree: Tree,
    topology: Option<DistMat>,
    distance: Option<DistMat>,
    pair_groups: HashMap<Linkage, PairGroup>,
}

impl TreeTable {
    pub fn new(tree: Tree) -> Self {
        Self {
            tree,
            topology: None,
            distance: None,
            pair_groups: HashMap::new(),
        }
    }

    /// Parses `newick` into a table whose tree is called `name`.
    pub fn from_newick(name: &str, newick: &str) -> Result<Self> {
        Ok(Self::new(Tree::from_newick(name, newick)?))
    }

    pub fn name(&self) -> &str {
        self.tree.name()
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn leaf_names(&self) -> &[String] {
        self.tree.leaf_names()
    }

    /// Leaf distance matrix, by edge count or by branch length.
    pub fn base_matrix(&mut self, use_distance: bool) -> &DistMat {
        let slot = if use_distance {
            &mut self.distance
        } else {
            &mut self.topology
        };
        slot.get_or_insert_with(|| {
            debug!(
                "computing base matrix of '{}' (use_distance = {use_distance})",
                self.tree.name()
            );
            base_distance_matrix(&self.tree, use_distance, false)
        })
    }

    fn pair_group(&mut self, linkage: Linkage) -> Result<&PairGroup> {
        match self.pair_groups.entry(linkage) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                debug!(
                    "computing {linkage} pair-group tree of '{}'",
                    self.tree.name()
                );
                let tree = pair_group_tree(&self.tree, linkage)?;
                let matrix = base_distance_matrix(&tree, false, false);
                Ok(entry.insert(PairGroup { tree, matrix }))
            }
        }
    }

    pub fn pair_group_tree(&mut self, linkage: Linkage) -> Result<&Tree> {
        Ok(&self.pair_group(linkage)?.tree)
    }

    /// Topological leaf distances of the pair-group tree.
    pub fn pair_group_matrix(&mut self, linkage: Linkage) -> Result<&DistMat> {
        Ok(&self.pair_group(linkage)?.matrix)
    }

    /// The matrix a [`MatrixType`] compares. Quadratic types share the
    /// matrix of their basic counterpart; the squaring happens after
    /// subtraction.
    pub fn matrix(&mut self, matrix_type: MatrixType) -> Result<&DistMat> {
        match matrix_type.source() {
            MatrixSource::Base { use_distance } => Ok(self.base_matrix(use_distance)),
            MatrixSource::PairGroup(linkage) => self.pair_group_matrix(linkage),
        }
    }
}
