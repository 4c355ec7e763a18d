//! Labeled distance matrices and the operations used to compare them.
//!
//! A [`DistMat`] is square: row `i` and column `i` both belong to
//! `labels[i]`. Cells are `Option<f64>`, where `None` means no value was
//! computed for that pair of labels, e.g. a leaf that only exists in one of
//! the two compared trees.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

/// Square distance matrix with row/column labels, stored row-major.
///
/// Deserializing checks that `data` holds exactly one cell per label pair.
#[derive(Clone, Debug, PartialEq, TS, Serialize)]
#[ts(export, export_to = "../../wasm/types/lib_types.ts")]
pub struct DistMat {
    labels: Vec<String>,
    data: Vec<Option<f64>>,
}

/// The serialized shape of a [`DistMat`], before its size is checked.
#[derive(Deserialize)]
struct RawDistMat {
    labels: Vec<String>,
    data: Vec<Option<f64>>,
}

impl TryFrom<RawDistMat> for DistMat {
    type Error = Error;

    fn try_from(raw: RawDistMat) -> Result<Self> {
        let expected = raw.labels.len() * raw.labels.len();
        if raw.data.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                found: raw.data.len(),
            });
        }
        Ok(Self {
            labels: raw.labels,
            data: raw.data,
        })
    }
}

impl<'de> Deserialize<'de> for DistMat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = RawDistMat::deserialize(deserializer)?;
        DistMat::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl DistMat {
    /// A matrix with every cell, the diagonal included, set to `None`.
    pub fn empty_with_labels(labels: Vec<String>) -> Self {
        let n = labels.len();
        Self {
            labels,
            data: vec![None; n * n],
        }
    }

    /// Builds a matrix from explicit rows.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if the rows do not form a square
    /// matrix with one row per label.
    pub fn from_rows(labels: Vec<String>, rows: Vec<Vec<Option<f64>>>) -> Result<Self> {
        let n = labels.len();
        if rows.len() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                found: rows.len(),
            });
        }
        if let Some(row) = rows.iter().find(|row| row.len() != n) {
            return Err(Error::DimensionMismatch {
                expected: n,
                found: row.len(),
            });
        }
        Ok(Self {
            labels,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn dim(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        self.data[i * self.dim() + j]
    }

    /// Sets both `(i, j)` and `(j, i)`.
    pub fn set(&mut self, i: usize, j: usize, value: Option<f64>) {
        let n = self.dim();
        self.data[i * n + j] = value;
        self.data[j * n + i] = value;
    }

    pub fn row(&self, i: usize) -> &[Option<f64>] {
        let n = self.dim();
        &self.data[i * n..(i + 1) * n]
    }

    pub fn rows(&self) -> Vec<Vec<Option<f64>>> {
        (0..self.dim()).map(|i| self.row(i).to_vec()).collect()
    }

    pub fn is_symmetric(&self) -> bool {
        let n = self.dim();
        (0..n).all(|i| {
            (0..i).all(|j| match (self.get(i, j), self.get(j, i)) {
                (Some(a), Some(b)) => a == b || (a.is_nan() && b.is_nan()),
                (a, b) => a.is_none() && b.is_none(),
            })
        })
    }

    /// Rows and columns reordered (or dropped) so that new row `r` is old row
    /// `order[r]`.
    fn select(&self, order: &[usize]) -> Self {
        let data = order
            .iter()
            .flat_map(|&i| order.iter().map(move |&j| (i, j)))
            .map(|(i, j)| self.get(i, j))
            .collect();
        Self {
            labels: order.iter().map(|&i| self.labels[i].clone()).collect(),
            data,
        }
    }

    /// Subtracts `other` from `self`, aligning cells by label.
    ///
    /// The result has the labels of `self` in their original order, followed
    /// by the labels only `other` has. A cell is only filled when both of its
    /// labels appear in both matrices (and both inputs have a value there);
    /// everything else is `None`. With `absolute` the difference is taken as
    /// an absolute value.
    pub fn subtract(&self, other: &DistMat, absolute: bool) -> DistMat {
        let other_index: HashMap<&str, usize> = other
            .labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();

        let mut labels = self.labels.clone();
        labels.extend(
            other
                .labels
                .iter()
                .filter(|l| self.index_of(l).is_none())
                .cloned(),
        );
        let mut result = DistMat::empty_with_labels(labels);

        // position in `other` of each of our own labels
        let mapped: Vec<Option<usize>> = self
            .labels
            .iter()
            .map(|l| other_index.get(l.as_str()).copied())
            .collect();

        for (i, oi) in mapped.iter().enumerate() {
            let Some(oi) = *oi else { continue };
            for (j, oj) in mapped.iter().enumerate().take(i + 1) {
                let Some(oj) = *oj else { continue };
                let value = match (self.get(i, j), other.get(oi, oj)) {
                    (Some(a), Some(b)) if absolute => Some((a - b).abs()),
                    (Some(a), Some(b)) => Some(a - b),
                    _ => None,
                };
                result.set(i, j, value);
            }
        }
        result
    }

    /// Drops every row (and its column) that holds nothing but `None`.
    pub fn remove_null(&self) -> DistMat {
        let keep: Vec<usize> = (0..self.dim())
            .filter(|&i| self.row(i).iter().any(Option::is_some))
            .collect();
        self.select(&keep)
    }

    /// Total of a row, with `None` cells counting as zero.
    pub fn row_sum(&self, i: usize) -> f64 {
        self.row(i).iter().flatten().sum()
    }

    /// Reorders rows and columns by row total, lowest first, or highest first
    /// when `descending` is set. Rows with equal totals keep their relative
    /// order, so sorting twice gives the same result as sorting once.
    ///
    /// Remove `None` rows first if they should not count as zero totals.
    pub fn sort_by_row_sum(&self, descending: bool) -> DistMat {
        let sums: Vec<f64> = (0..self.dim()).map(|i| self.row_sum(i)).collect();
        let mut order: Vec<usize> = (0..self.dim()).collect();
        if descending {
            order.sort_by(|&a, &b| sums[b].total_cmp(&sums[a]));
        } else {
            order.sort_by(|&a, &b| sums[a].total_cmp(&sums[b]));
        }
        self.select(&order)
    }

    /// Squares every value while keeping its sign, which makes large
    /// differences stand out.
    pub fn signed_square(&self) -> DistMat {
        let data = self
            .data
            .iter()
            .map(|cell| cell.map(|x| if x < 0.0 { -(x * x) } else { x * x }))
            .collect();
        DistMat {
            labels: self.labels.clone(),
            data,
        }
    }
}
