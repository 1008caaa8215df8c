//! The coverage mapping format.
//!
//! Compilers that instrument code for source-based coverage embed a *coverage mapping* section
//! into every object file. It links the runtime profile counters of each function back to the
//! source code regions they count, so that a reporting tool can later attribute execution counts
//! to lines and columns.
//!
//! This crate produces that section. The [`converter`] module contains the builders and writers:
//!
//! - [`FilenameTable`] deduplicates and normalizes source paths into the module-wide string
//!   table, which is serialized with [`write_filenames_section`].
//! - [`ExpressionTable`] collects counter [`CounterExpression`]s.
//! - [`CoverageMappingWriter`] encodes the per-function payload: the file id list, the
//!   expressions, and the delta-encoded [`MappingRegion`]s.
//! - [`FunctionCoverage`] gathers counters and expressions by id the way an instrumentation pass
//!   hands them out, and turns them into a [`FunctionCoverageRecord`].
//! - [`CoverageMapWriter`] assembles the complete section for a module.
//!
//! The [`format`] module contains the inverse: a decoder that reads back everything the writers
//! produce. [`object`] provides the format version and the section names for each object format.
//!
//! # Examples
//!
//! ```
//! use symbolic_covmap::{
//!     Counter, CoverageMappingWriter, ExpressionTable, ExprKind, FilenameTable, MappingRegion,
//! };
//! use symbolic_covmap::format::CoverageMapping;
//!
//! let mut filenames = FilenameTable::with_working_dir("/src/project");
//! let file = filenames.intern("main.rs").unwrap();
//!
//! let mut expressions = ExpressionTable::new();
//! let expr = expressions.add(ExprKind::Add, Counter::CounterValueReference(1), Counter::Zero);
//!
//! let regions = [
//!     MappingRegion::code(Counter::CounterValueReference(0), 0, 1, 1, 3, 2),
//!     MappingRegion::code(Counter::Expression(expr), 0, 4, 5, 4, 20),
//! ];
//! let payload = CoverageMappingWriter::new(&[file], expressions.as_slice(), &regions)
//!     .to_vec()
//!     .unwrap();
//!
//! let mapping = CoverageMapping::parse(&payload).unwrap();
//! assert_eq!(mapping.regions, regions);
//! ```

#![warn(missing_docs)]

pub mod converter;
pub mod counter;
pub mod error;
pub mod format;
pub mod object;

pub use converter::*;
pub use counter::{Counter, CounterExpression, ExprKind};
pub use error::{
    DroppedExpression, EncodingError, Error, ErrorSink, PathError, UnsupportedFormatError,
};
pub use object::{
    current_version, mapping_var_name, section_name, section_name_with_segment, ObjectFormat,
    COVMAP_ALIGNMENT, COVMAP_VERSION,
};
