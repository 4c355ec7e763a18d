//! Difference distance matrices (DDM) for comparing two phylogenetic trees.
//!
//! Both trees are read from Newick strings, turned into leaf-to-leaf distance
//! matrices, and subtracted from each other. Large cells in the resulting
//! matrix point at leaves whose placement differs between the trees.
//!
//! # Types
//!
//! - Tree
//!   - Arena-backed rooted tree with any number of children per node. Nodes
//!     are addressed by `NodeId`; a node is the root, an internal node or a
//!     leaf, and the kind decides which mutations are legal (a root never
//!     gets a parent, a leaf never gets children).
//!   - `Tree::from_newick(name, newick)` reads all six Newick variants,
//!     distinguishing them by whether branch lengths, leaf names and internal
//!     names are present. Unnamed leaves get generated names, repeated names
//!     get a ` (N)` suffix.
//!   - `to_newick(hide_internal)` writes a tree back out.
//!
//! - DistMat
//!   - Square labeled matrix with `Option<f64>` cells, `None` marking pairs
//!     that have no value.
//!   - `subtract`, `remove_null`, `sort_by_row_sum` and `signed_square` are
//!     the steps of the comparison pipeline.
//!
//! - TreeTable
//!   - Holds one tree and computes its matrices lazily: the topology and
//!     branch-length matrices, and for every `Linkage` the pair-group tree
//!     with its matrix.
//!
//! - DdmConfig
//!   - One comparison request: two named Newick strings plus the
//!     `ComparisonOptions` (matrix type, absolute differences, whether to
//!     keep null rows, sort order).
//!
//! # Functions
//!
//! - base_distance_matrix(tree, use_distance, inf_diagonal) -> DistMat
//!   - Leaf distances through the lowest common ancestor, counted in edges or
//!     summed branch lengths.
//!
//! - pair_group_tree(tree, linkage) -> Result<Tree>
//!   - Agglomerative clustering of the leaves with min, max or average
//!     linkage. The result only encodes merge order; its topology matrix is
//!     what the `*_PGM` matrix types compare.
//!
//! - ddm(conf) -> Result<DistMat>
//!   - Runs a whole comparison: parse, select matrices, subtract, drop null
//!     rows unless asked to keep them, square for the quadratic types, sort.
//!
//! - ddm_batch(confs) -> Vec<Result<DistMat>>
//!   - Independent comparisons spread over the rayon thread pool, results in
//!     input order.
//!
//! # Examples
//!
//! ```
//! use ddm::{ddm, ComparisonOptions, DdmConfig, MatrixType, NewickInput};
//!
//! let conf = DdmConfig {
//!     first: NewickInput { name: "a".into(), newick: "((A,B),C);".into() },
//!     second: NewickInput { name: "b".into(), newick: "((A,C),B);".into() },
//!     options: ComparisonOptions { matrix_type: MatrixType::Basic, ..Default::default() },
//! };
//! let diff = ddm(conf).unwrap();
//! assert_eq!(diff.labels(), ["A", "B", "C"]);
//! assert_eq!(diff.get(0, 1), Some(1.0));
//! ```
//!
//! # Errors
//!
//! Every fallible function returns [`Error`]. Malformed Newick text comes
//! back as `Error::ParseFormat`, unknown selector strings as
//! `Error::UnsupportedMode`, illegal tree edits as
//! `Error::StructuralViolation`.
mod config;
mod distance;
mod error;
mod matrix;
mod newick;
mod pair_group;
mod table;
mod tree;

pub use crate::config::{
    ComparisonOptions, DdmConfig, MatrixSource, MatrixType, NewickInput, SortOrder,
};
pub use crate::distance::base_distance_matrix;
pub use crate::error::{Error, NewickError, Result};
pub use crate::matrix::DistMat;
pub use crate::newick::NewickFormat;
pub use crate::pair_group::{
    pair_group_matrix, pair_group_tree, pair_group_tree_from_matrix, Linkage,
    PAIR_GROUP_ROOT_NAME, PAIR_GROUP_TREE_NAME,
};
pub use crate::table::TreeTable;
pub use crate::tree::{Ancestors, NodeId, NodeKind, Tree, TreeNode};
use log::info;
use rayon::prelude::*;

/// Difference matrix of two trees that are already loaded.
///
/// The tables keep the matrices they compute, so comparing the same table
/// again with another option set only redoes the cheap steps.
pub fn compare(
    first: &mut TreeTable,
    second: &mut TreeTable,
    options: &ComparisonOptions,
) -> Result<DistMat> {
    let matrix_type = options.matrix_type;
    let a = first.matrix(matrix_type)?;
    let b = second.matrix(matrix_type)?;
    let mut diff = a.subtract(b, options.absolute);
    if !options.keep_null {
        diff = diff.remove_null();
    }
    if matrix_type.is_quadratic() {
        diff = diff.signed_square();
    }
    Ok(options.sort.apply(diff))
}

pub fn ddm(conf: DdmConfig) -> Result<DistMat> {
    let mut first = TreeTable::from_newick(&conf.first.name, &conf.first.newick)?;
    let mut second = TreeTable::from_newick(&conf.second.name, &conf.second.newick)?;
    info!(
        "comparing '{}' ({} leaves) with '{}' ({} leaves) using {} matrices",
        first.name(),
        first.leaf_names().len(),
        second.name(),
        second.leaf_names().len(),
        conf.options.matrix_type
    );
    let diff = compare(&mut first, &mut second, &conf.options)?;
    info!("difference matrix has {} rows", diff.dim());
    Ok(diff)
}

pub fn ddm_batch(confs: &[DdmConfig]) -> Vec<Result<DistMat>> {
    info!("running {} comparisons", confs.len());
    confs.par_iter().cloned().map(ddm).collect()
}
