//! Builders and writers for coverage mapping data.
//!
//! The building blocks ([`FilenameTable`], [`ExpressionTable`], [`MappingRegion`] and
//! [`CoverageMappingWriter`]) correspond directly to the parts of the format. [`FunctionCoverage`]
//! and [`CoverageMapWriter`] sit on top of them and take care of id translation, file ids,
//! sorting and section assembly.

mod covmap;
mod expressions;
mod filenames;
mod function;
mod mapping;
mod record;
mod regions;

pub use covmap::{CoverageMapWriter, Stats};
pub use expressions::ExpressionTable;
pub use filenames::{
    normalize, normalize_in, write_filenames_section, FilenameTable, NormalizedPath,
    SharedFilenameTable,
};
pub use function::{CodeRegion, FunctionCoverage};
pub use mapping::CoverageMappingWriter;
pub use record::FunctionCoverageRecord;
pub use regions::{encode_regions, MappingRegion, RegionKind};
