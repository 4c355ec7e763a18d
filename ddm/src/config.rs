use crate::error::{Error, Result};
use crate::matrix::DistMat;
use crate::pair_group::Linkage;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

#[derive(Clone, Debug, TS, Serialize, Deserialize)]
#[ts(export, export_to = "../../wasm/types/lib_types.ts")]
pub struct NewickInput {
    pub name: String,
    pub newick: String,
}

/// Which distance matrix of a tree to compare.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, TS, Serialize, Deserialize)]
#[ts(export, export_to = "../../wasm/types/lib_types.ts")]
pub enum MatrixType {
    /// Edge counts between leaves.
    #[default]
    #[serde(rename = "basic")]
    Basic,
    /// Summed branch lengths between leaves.
    #[serde(rename = "basic_distance")]
    BasicDistance,
    /// [`MatrixType::Basic`], with the difference squared.
    #[serde(rename = "quadratic")]
    Quadratic,
    /// [`MatrixType::BasicDistance`], with the difference squared.
    #[serde(rename = "quadratic_distance")]
    QuadraticDistance,
    #[serde(rename = "min_PGM")]
    MinPgm,
    #[serde(rename = "max_PGM")]
    MaxPgm,
    #[serde(rename = "average_PGM")]
    AveragePgm,
}

/// Where the values of a [`MatrixType`] come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatrixSource {
    Base { use_distance: bool },
    PairGroup(Linkage),
}

impl MatrixType {
    pub const ALL: [MatrixType; 7] = [
        MatrixType::Basic,
        MatrixType::BasicDistance,
        MatrixType::Quadratic,
        MatrixType::QuadraticDistance,
        MatrixType::MinPgm,
        MatrixType::MaxPgm,
        MatrixType::AveragePgm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatrixType::Basic => "basic",
            MatrixType::BasicDistance => "basic_distance",
            MatrixType::Quadratic => "quadratic",
            MatrixType::QuadraticDistance => "quadratic_distance",
            MatrixType::MinPgm => "min_PGM",
            MatrixType::MaxPgm => "max_PGM",
            MatrixType::AveragePgm => "average_PGM",
        }
    }

    pub fn source(&self) -> MatrixSource {
        match self {
            MatrixType::Basic | MatrixType::Quadratic => MatrixSource::Base {
                use_distance: false,
            },
            MatrixType::BasicDistance | MatrixType::QuadraticDistance => MatrixSource::Base {
                use_distance: true,
            },
            MatrixType::MinPgm => MatrixSource::PairGroup(Linkage::Min),
            MatrixType::MaxPgm => MatrixSource::PairGroup(Linkage::Max),
            MatrixType::AveragePgm => MatrixSource::PairGroup(Linkage::Average),
        }
    }

    /// Whether the difference matrix gets a signed square.
    pub fn is_quadratic(&self) -> bool {
        matches!(self, MatrixType::Quadratic | MatrixType::QuadraticDistance)
    }
}

impl fmt::Display for MatrixType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatrixType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MatrixType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::unsupported("matrix type", s))
    }
}

/// Row and column order of the final difference matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, TS, Serialize, Deserialize)]
#[ts(export, export_to = "../../wasm/types/lib_types.ts")]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// Keep the order the leaves were found in.
    #[default]
    Default,
    /// Not computed here; the matrix order is kept as is.
    Seriation,
    LowHigh,
    HighLow,
}

impl SortOrder {
    pub const ALL: [SortOrder; 4] = [
        SortOrder::Default,
        SortOrder::Seriation,
        SortOrder::LowHigh,
        SortOrder::HighLow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Default => "default",
            SortOrder::Seriation => "seriation",
            SortOrder::LowHigh => "low-high",
            SortOrder::HighLow => "high-low",
        }
    }

    pub fn apply(&self, matrix: DistMat) -> DistMat {
        match self {
            SortOrder::Default => matrix,
            SortOrder::Seriation => {
                warn!("seriation order is not computed, keeping the leaf order");
                matrix
            }
            SortOrder::LowHigh => matrix.sort_by_row_sum(false),
            SortOrder::HighLow => matrix.sort_by_row_sum(true),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SortOrder::ALL
            .into_iter()
            .find(|o| o.as_str() == s)
            .ok_or_else(|| Error::unsupported("sort order", s))
    }
}

fn default_absolute() -> bool {
    true
}

/// How two trees are compared.
#[derive(Clone, Debug, PartialEq, TS, Serialize, Deserialize)]
#[ts(export, export_to = "../../wasm/types/lib_types.ts")]
pub struct ComparisonOptions {
    #[serde(default)]
    pub matrix_type: MatrixType,
    /// Take absolute differences instead of signed ones.
    #[serde(default = "default_absolute")]
    pub absolute: bool,
    /// Keep rows of leaves that are only in one of the trees.
    #[serde(default)]
    pub keep_null: bool,
    #[serde(default)]
    pub sort: SortOrder,
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            matrix_type: MatrixType::default(),
            absolute: default_absolute(),
            keep_null: false,
            sort: SortOrder::default(),
        }
    }
}

#[derive(Clone, Debug, TS, Serialize, Deserialize)]
#[ts(export, export_to = "../../wasm/types/lib_types.ts")]
pub struct DdmConfig {
    pub first: NewickInput,
    pub second: NewickInput,
    #[serde(flatten)]
    pub options: ComparisonOptions,
}
