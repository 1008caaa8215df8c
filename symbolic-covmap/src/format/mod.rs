//! Decoding of the coverage mapping format.
//!
//! This is the inverse of the writers in [`converter`](crate::converter). It reads the filenames
//! section, the per-function mapping payloads and complete coverage map sections.

use std::str;

use scroll::ctx::SizeWith;
use scroll::{Endian, Pread};
use thiserror::Error;

use crate::converter::{MappingRegion, RegionKind};
use crate::counter::{Counter, CounterExpression, ExprKind};
use crate::object::COVMAP_VERSION;

pub mod raw;
pub mod varint;

use raw::{CovMapHeader, FunctionRecord};
use varint::Reader;

/// Errors that can happen while decoding coverage mapping data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    /// The data ended in the middle of a value.
    #[error("unexpected end of data at offset {0}")]
    UnexpectedEof(usize),
    /// A varint does not fit into its target type.
    #[error("varint at offset {0} overflows")]
    VarintOverflow(usize),
    /// A counter tag encodes an index that does not fit into 32 bits.
    #[error("invalid counter tag {0}")]
    InvalidCounterTag(u64),
    /// A region header carries an unknown region kind.
    #[error("invalid region kind {0}")]
    InvalidRegionKind(u64),
    /// An expression carries an unknown operator byte.
    #[error("invalid expression operator {0}")]
    InvalidOperator(u8),
    /// A filename is not valid UTF-8.
    #[error("filename contains invalid UTF-8")]
    InvalidUtf8(#[source] str::Utf8Error),
    /// Region groups are not in file id order.
    #[error("expected region group for file id {expected}, found {found}")]
    UnexpectedFileId {
        /// The file id that should come next.
        expected: usize,
        /// The file id that was found.
        found: u32,
    },
    /// A decoded line number does not fit into 32 bits.
    #[error("line number overflows")]
    LineOverflow,
    /// Bytes are left over after the encoded data.
    #[error("trailing data at offset {0}")]
    TrailingData(usize),
    /// A fixed-size header could not be read.
    #[error("header is too small")]
    BadHeader,
    /// The section was written with another format version.
    #[error("unknown coverage mapping version {0}")]
    WrongVersion(u32),
}

fn read_counter(reader: &mut Reader<'_>) -> Result<Counter, DecodeError> {
    let tag = reader.read_uleb128()?;
    Counter::from_tag(tag).ok_or(DecodeError::InvalidCounterTag(tag))
}

/// Parses a filenames section into its filenames.
pub fn parse_filenames(data: &[u8]) -> Result<Vec<&str>, DecodeError> {
    let mut reader = Reader::new(data);
    let count = reader.read_uleb128_usize()?;
    let mut filenames = Vec::with_capacity(count.min(data.len()));
    for _ in 0..count {
        let len = reader.read_uleb128_usize()?;
        let bytes = reader.read_bytes(len)?;
        filenames.push(str::from_utf8(bytes).map_err(DecodeError::InvalidUtf8)?);
    }
    if !reader.is_empty() {
        return Err(DecodeError::TrailingData(reader.offset()));
    }
    Ok(filenames)
}

/// The decoded mapping payload of one function.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoverageMapping {
    /// Indices into the module's filenames, one per function-local file id.
    pub file_ids: Vec<u32>,
    /// The function's counter expressions.
    pub expressions: Vec<CounterExpression>,
    /// The function's regions, sorted by file id and start position.
    pub regions: Vec<MappingRegion>,
}

impl CoverageMapping {
    /// Parses a mapping payload as written by
    /// [`CoverageMappingWriter`](crate::CoverageMappingWriter).
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(data);

        let num_files = reader.read_uleb128_usize()?;
        let mut file_ids = Vec::with_capacity(num_files.min(data.len()));
        for _ in 0..num_files {
            file_ids.push(reader.read_uleb128_u32()?);
        }

        let num_expressions = reader.read_uleb128_usize()?;
        let mut expressions = Vec::with_capacity(num_expressions.min(data.len()));
        for _ in 0..num_expressions {
            let lhs = read_counter(&mut reader)?;
            let rhs = read_counter(&mut reader)?;
            let op = reader.read_u8()?;
            let kind = ExprKind::from_byte(op).ok_or(DecodeError::InvalidOperator(op))?;
            expressions.push(CounterExpression { kind, lhs, rhs });
        }

        let mut regions = Vec::new();
        for expected in 0..num_files {
            let file_id = reader.read_uleb128_u32()?;
            if file_id as usize != expected {
                return Err(DecodeError::UnexpectedFileId {
                    expected,
                    found: file_id,
                });
            }
            let num_regions = reader.read_uleb128_usize()?;
            let mut previous_line = 0u32;
            for _ in 0..num_regions {
                let region = read_region(&mut reader, file_id, previous_line)?;
                previous_line = region.line_start;
                regions.push(region);
            }
        }

        if !reader.is_empty() {
            return Err(DecodeError::TrailingData(reader.offset()));
        }

        Ok(Self {
            file_ids,
            expressions,
            regions,
        })
    }
}

fn read_region(
    reader: &mut Reader<'_>,
    file_id: u32,
    previous_line: u32,
) -> Result<MappingRegion, DecodeError> {
    let header = reader.read_uleb128()?;
    let tag = header >> raw::REGION_KIND_BITS;
    let counter = Counter::from_tag(tag).ok_or(DecodeError::InvalidCounterTag(tag))?;
    let kind = match header & raw::REGION_KIND_MASK {
        raw::KIND_CODE => RegionKind::Code,
        raw::KIND_EXPANSION => RegionKind::Expansion {
            expanded_file_id: reader.read_uleb128_u32()?,
        },
        raw::KIND_SKIPPED => RegionKind::Skipped,
        raw::KIND_GAP => RegionKind::Gap,
        raw::KIND_BRANCH => RegionKind::Branch {
            false_counter: read_counter(reader)?,
        },
        other => return Err(DecodeError::InvalidRegionKind(other)),
    };

    let line_delta = reader.read_uleb128_u32()?;
    let column_start = reader.read_uleb128_u32()?;
    let line_count = reader.read_uleb128_u32()?;
    let column_end = reader.read_uleb128_u32()?;

    let line_start = previous_line
        .checked_add(line_delta)
        .ok_or(DecodeError::LineOverflow)?;
    let line_end = line_start
        .checked_add(line_count)
        .ok_or(DecodeError::LineOverflow)?;

    Ok(MappingRegion {
        counter,
        file_id,
        line_start,
        column_start,
        line_end,
        column_end,
        kind,
    })
}

/// One function's header and mapping payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Function<'data> {
    /// The function's record header.
    pub record: FunctionRecord,
    /// The encoded mapping payload.
    pub payload: &'data [u8],
}

impl<'data> Function<'data> {
    /// Parses a single function buffer, as written by
    /// [`FunctionCoverageRecord::to_bytes`](crate::FunctionCoverageRecord::to_bytes).
    pub fn parse(data: &'data [u8], endian: Endian) -> Result<Self, DecodeError> {
        let mut offset = 0;
        let record: FunctionRecord = data
            .gread_with(&mut offset, endian)
            .map_err(|_| DecodeError::BadHeader)?;
        let end = offset + record.data_size as usize;
        if end > data.len() {
            return Err(DecodeError::UnexpectedEof(data.len()));
        }
        if end < data.len() {
            return Err(DecodeError::TrailingData(end));
        }
        Ok(Self {
            record,
            payload: &data[offset..end],
        })
    }

    /// Decodes the mapping payload.
    pub fn mapping(&self) -> Result<CoverageMapping, DecodeError> {
        CoverageMapping::parse(self.payload)
    }
}

/// A complete coverage map section, as written by [`CoverageMapWriter`](crate::CoverageMapWriter).
#[derive(Clone, Debug)]
pub struct CovMap<'data> {
    header: CovMapHeader,
    records: Vec<FunctionRecord>,
    filenames: Vec<&'data str>,
    coverage: &'data [u8],
}

impl<'data> CovMap<'data> {
    /// Parses a coverage map section written in the given byte order.
    pub fn parse(data: &'data [u8], endian: Endian) -> Result<Self, DecodeError> {
        let mut offset = 0;
        let header: CovMapHeader = data
            .gread_with(&mut offset, endian)
            .map_err(|_| DecodeError::BadHeader)?;
        if header.version != COVMAP_VERSION {
            return Err(DecodeError::WrongVersion(header.version));
        }

        let records_size = header.n_records as usize * FunctionRecord::size_with(&endian);
        if data.len() - offset < records_size {
            return Err(DecodeError::UnexpectedEof(data.len()));
        }
        let mut records = Vec::with_capacity(header.n_records as usize);
        for _ in 0..header.n_records {
            let record: FunctionRecord = data
                .gread_with(&mut offset, endian)
                .map_err(|_| DecodeError::BadHeader)?;
            records.push(record);
        }

        let mut reader = Reader::new(&data[offset..]);
        let filenames = parse_filenames(reader.read_bytes(header.filenames_size as usize)?)?;
        let coverage = reader.read_bytes(header.coverage_size as usize)?;

        Ok(Self {
            header,
            records,
            filenames,
            coverage,
        })
    }

    /// The section header.
    pub fn header(&self) -> &CovMapHeader {
        &self.header
    }

    /// The format version of the section.
    pub fn version(&self) -> u32 {
        self.header.version
    }

    /// The module-wide filenames.
    pub fn filenames(&self) -> &[&'data str] {
        &self.filenames
    }

    /// An iterator over all functions in this section.
    pub fn functions(&self) -> FunctionIter<'_, 'data> {
        FunctionIter {
            records: self.records.iter(),
            coverage: self.coverage,
            offset: 0,
        }
    }
}

/// An iterator over the functions of a [`CovMap`].
#[derive(Clone, Debug)]
pub struct FunctionIter<'a, 'data> {
    records: std::slice::Iter<'a, FunctionRecord>,
    coverage: &'data [u8],
    offset: usize,
}

impl<'a, 'data> Iterator for FunctionIter<'a, 'data> {
    type Item = Result<Function<'data>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = *self.records.next()?;
        let end = self.offset + record.data_size as usize;
        match self.coverage.get(self.offset..end) {
            Some(payload) => {
                self.offset = end;
                Some(Ok(Function { record, payload }))
            }
            None => {
                // A truncated payload makes every later offset meaningless.
                let rest = self.records.as_slice();
                self.records = rest[rest.len()..].iter();
                Some(Err(DecodeError::UnexpectedEof(self.coverage.len())))
            }
        }
    }
}
