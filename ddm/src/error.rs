use thiserror::Error;

/// Result alias used throughout `ddm`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while building trees, matrices and difference matrices.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// An illegal tree mutation: a root given a parent or a non-zero
    /// distance, a leaf given children, or a handle from another tree.
    #[error("structural violation: {0}")]
    StructuralViolation(String),
    /// The Newick text could not be turned into a tree.
    #[error("could not parse Newick string: {0}")]
    ParseFormat(#[from] NewickError),
    /// An unknown linkage, matrix type or sort order selector.
    #[error("unsupported {kind} '{value}'")]
    UnsupportedMode {
        /// Which selector was being parsed.
        kind: &'static str,
        /// The rejected text.
        value: String,
    },
    /// Two rows or matrices that must have the same size do not.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected length.
        expected: usize,
        /// Found length.
        found: usize,
    },
}

/// Errors that can occur while reading a Newick string.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NewickError {
    /// There is nothing to parse.
    #[error("the string is empty")]
    Empty,
    /// Internal nodes are named but leaves are not, which none of the six
    /// Newick variants allow.
    #[error("internal node names without leaf names is not a supported format")]
    UnsupportedFormat,
    /// The string does not end with a semicolon.
    #[error("the tree is missing a terminating ';'")]
    MissingSemicolon,
    /// A `)` without a matching `(`, or a `(` that is never closed.
    #[error("unbalanced parentheses at position {0}")]
    UnbalancedParentheses(usize),
    /// A character that cannot appear at this point, e.g. a second `(` at the
    /// top level or text before the opening bracket.
    #[error("unexpected '{found}' at position {position}")]
    UnexpectedCharacter {
        /// The offending character.
        found: char,
        /// Its byte offset in the input.
        position: usize,
    },
    /// A branch length that is not a number.
    #[error("could not parse branch length '{0}'")]
    InvalidDistance(String),
}

impl Error {
    pub(crate) fn structural(message: impl Into<String>) -> Self {
        Error::StructuralViolation(message.into())
    }

    pub(crate) fn unsupported(kind: &'static str, value: &str) -> Self {
        Error::UnsupportedMode {
            kind,
            value: value.to_string(),
        }
    }
}
