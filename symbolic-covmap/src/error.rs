//! Error types, and the [`ErrorSink`] trait that is used for lenient processing.

use std::io;

use thiserror::Error;

use crate::object::ObjectFormat;

/// The [`ErrorSink`] is used to raise errors that happen during processing.
///
/// Some processing steps, such as resolving the expressions of a
/// [`FunctionCoverage`](crate::FunctionCoverage), skip over individual invalid items instead of
/// failing as a whole. Those problems are pushed out to the [`ErrorSink`], and it is the
/// responsibility of the user to decide what to do with them.
pub trait ErrorSink<E> {
    /// Raises an intermediate processing error with the [`ErrorSink`].
    fn raise_error(&mut self, error: E);
}

impl<E, F: FnMut(E)> ErrorSink<E> for F {
    fn raise_error(&mut self, error: E) {
        self(error)
    }
}

/// A source path could not be normalized.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PathError {
    /// The path contains an embedded NUL byte.
    #[error("path {0:?} contains a NUL byte")]
    NulByte(String),
    /// The path is empty.
    #[error("path is empty")]
    Empty,
    /// The path is not valid UTF-8.
    #[error("path {0:?} is not valid UTF-8")]
    NonUtf8(std::path::PathBuf),
    /// The current working directory could not be determined.
    #[error("failed to determine the working directory")]
    WorkingDir(#[source] io::Error),
}

/// The coverage data violates an invariant of the mapping format.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EncodingError {
    /// The end of a region lies before its start.
    #[error(
        "region {index} ends before it starts ({line_start}:{column_start} - {line_end}:{column_end})"
    )]
    MalformedSpan {
        /// Position of the region in its sequence.
        index: usize,
        /// The region's start line.
        line_start: u32,
        /// The region's start column.
        column_start: u32,
        /// The region's end line.
        line_end: u32,
        /// The region's end column.
        column_end: u32,
    },
    /// Regions are not sorted by `(file_id, line_start, column_start)`.
    #[error("region {index} is not sorted by file id, start line and start column")]
    UnsortedRegions {
        /// Position of the first out-of-order region.
        index: usize,
    },
    /// A region refers to a file id outside of the function's file id list.
    #[error("file id {file_id} out of bounds ({num_files} files)")]
    InvalidFileId {
        /// The referenced file id.
        file_id: u32,
        /// Number of file ids of the function.
        num_files: usize,
    },
    /// A counter refers to an expression that does not exist.
    #[error("expression index {index} out of bounds ({num_expressions} expressions)")]
    InvalidExpressionReference {
        /// The referenced expression index.
        index: u32,
        /// Number of expressions of the function.
        num_expressions: usize,
    },
    /// An expression operand refers to the expression itself or to a later one.
    #[error("expression {position} refers to expression {index}, which does not precede it")]
    ForwardExpressionReference {
        /// Position of the offending expression in the table.
        position: usize,
        /// The referenced expression index.
        index: u32,
    },
    /// A counter id was added twice.
    #[error("counter {0} was added more than once")]
    DuplicateCounter(u32),
    /// A counter id is outside of the declared number of counters.
    #[error("counter {id} out of bounds ({num_counters} counters)")]
    CounterOutOfRange {
        /// The counter id.
        id: u32,
        /// Declared number of counters.
        num_counters: u32,
    },
    /// An expression id was added twice.
    #[error("expression {0} was added more than once")]
    DuplicateExpression(u32),
    /// An expression id is outside of the declared number of expressions.
    #[error("expression {id} out of bounds ({num_expressions} expressions)")]
    ExpressionOutOfRange {
        /// The expression id.
        id: u32,
        /// Declared number of expressions.
        num_expressions: u32,
    },
    /// A buffer or table grew larger than its `u32` size field can express.
    #[error("{0} does not fit into 32 bits")]
    TooLarge(&'static str),
    /// A fixed-size header could not be written.
    #[error("failed to write header")]
    Header(#[from] HeaderError),
}

/// Wrapper around header write errors, so that [`EncodingError`] stays comparable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HeaderError(pub(crate) String);

impl From<scroll::Error> for HeaderError {
    fn from(error: scroll::Error) -> Self {
        Self(error.to_string())
    }
}

/// The object format has no coverage mapping section.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("object format {format} does not support coverage mapping sections")]
pub struct UnsupportedFormatError {
    /// The requested object format.
    pub format: ObjectFormat,
}

/// Any error that can happen while producing coverage mapping data.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A source path could not be normalized.
    #[error(transparent)]
    Path(#[from] PathError),
    /// The coverage data could not be encoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// The object format is not supported.
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormatError),
    /// Writing the encoded data failed.
    #[error("failed to write coverage mapping")]
    Io(#[from] io::Error),
}

/// An expression was dropped because one of its operands does not resolve.
///
/// This happens when an operand references a counter or expression that was never added, for
/// example because an optimization removed it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("dropped expression {id} with unresolved operands ({lhs}, {rhs})")]
pub struct DroppedExpression {
    /// The id of the dropped expression.
    pub id: u32,
    /// The left-hand side operand id.
    pub lhs: u32,
    /// The right-hand side operand id.
    pub rhs: u32,
}
