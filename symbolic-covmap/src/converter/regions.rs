//! Mapping regions and their delta encoding.

#[cfg(feature = "serde")]
use serde_::{Deserialize, Serialize};

use crate::counter::Counter;
use crate::error::EncodingError;
use crate::format::raw;
use crate::format::varint::{write_uleb128, write_uleb128_u32, write_uleb128_usize};

/// The kind of a [`MappingRegion`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(crate = "serde_"))]
pub enum RegionKind {
    /// Executable code, counted by the region's counter.
    Code,
    /// A macro or include expansion whose regions live in another file id.
    Expansion {
        /// The function-local file id containing the expanded regions.
        expanded_file_id: u32,
    },
    /// Code that was skipped, for example by the preprocessor.
    Skipped,
    /// Non-executable code inside a counted region, such as whitespace between statements.
    ///
    /// A gap's count is only used for a line if no other region starts on it.
    Gap,
    /// A branch condition. The region's counter counts the `true` outcome.
    Branch {
        /// The counter of the `false` outcome.
        false_counter: Counter,
    },
}

impl RegionKind {
    fn code(self) -> u64 {
        match self {
            RegionKind::Code => raw::KIND_CODE,
            RegionKind::Expansion { .. } => raw::KIND_EXPANSION,
            RegionKind::Skipped => raw::KIND_SKIPPED,
            RegionKind::Gap => raw::KIND_GAP,
            RegionKind::Branch { .. } => raw::KIND_BRANCH,
        }
    }
}

impl Default for RegionKind {
    fn default() -> Self {
        RegionKind::Code
    }
}

/// A span of source code and the counter that counts it.
///
/// Lines and columns are 1-based. `file_id` indexes the function's file id list, not the
/// module-wide filename table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(crate = "serde_"))]
pub struct MappingRegion {
    /// The counter of this region.
    pub counter: Counter,
    /// The function-local file id.
    pub file_id: u32,
    /// The first line of the region.
    pub line_start: u32,
    /// The first column of the region.
    pub column_start: u32,
    /// The last line of the region.
    pub line_end: u32,
    /// The end column of the region.
    pub column_end: u32,
    /// The region kind.
    pub kind: RegionKind,
}

impl MappingRegion {
    /// Creates a code region.
    pub fn code(
        counter: Counter,
        file_id: u32,
        line_start: u32,
        column_start: u32,
        line_end: u32,
        column_end: u32,
    ) -> Self {
        Self {
            counter,
            file_id,
            line_start,
            column_start,
            line_end,
            column_end,
            kind: RegionKind::Code,
        }
    }

    /// Changes the kind of this region.
    pub fn with_kind(mut self, kind: RegionKind) -> Self {
        self.kind = kind;
        self
    }

    /// The key regions are sorted by.
    pub fn sort_key(&self) -> (u32, u32, u32) {
        (self.file_id, self.line_start, self.column_start)
    }

    fn has_valid_span(&self) -> bool {
        (self.line_end, self.column_end) >= (self.line_start, self.column_start)
    }

    /// All counters this region references.
    pub(crate) fn counters(&self) -> impl Iterator<Item = Counter> {
        let false_counter = match self.kind {
            RegionKind::Branch { false_counter } => Some(false_counter),
            _ => None,
        };
        std::iter::once(self.counter).chain(false_counter)
    }
}

/// Checks every region before anything gets encoded.
fn validate(regions: &[MappingRegion], num_files: usize) -> Result<(), EncodingError> {
    let check_file_id = |file_id: u32| {
        if file_id as usize >= num_files {
            Err(EncodingError::InvalidFileId { file_id, num_files })
        } else {
            Ok(())
        }
    };

    for (index, region) in regions.iter().enumerate() {
        if !region.has_valid_span() {
            return Err(EncodingError::MalformedSpan {
                index,
                line_start: region.line_start,
                column_start: region.column_start,
                line_end: region.line_end,
                column_end: region.column_end,
            });
        }
        check_file_id(region.file_id)?;
        if let RegionKind::Expansion { expanded_file_id } = region.kind {
            check_file_id(expanded_file_id)?;
        }
        if index > 0 && regions[index - 1].sort_key() > region.sort_key() {
            return Err(EncodingError::UnsortedRegions { index });
        }
    }
    Ok(())
}

/// Encodes the regions of one function.
///
/// `regions` must be sorted by `(file_id, line_start, column_start)`. Unsorted input is
/// rejected, not reordered. Every file id in `0..file_ids.len()` gets a group consisting of the
/// file id, the number of regions and the regions themselves, even if the group is empty.
///
/// Each region starts with a packed header holding the counter tag and the region kind, followed
/// by the kind's extra data and the location. The start line is stored as the distance to the
/// start line of the preceding region in the same group. The base is the preceding *start*
/// line rather than its end line: a nested or expansion region may end after the next region
/// starts, and a delta from its end line would be negative.
pub fn encode_regions(
    regions: &[MappingRegion],
    file_ids: &[u32],
) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::new();
    encode_regions_into(&mut out, regions, file_ids.len())?;
    Ok(out)
}

pub(crate) fn encode_regions_into(
    out: &mut Vec<u8>,
    regions: &[MappingRegion],
    num_files: usize,
) -> Result<(), EncodingError> {
    validate(regions, num_files)?;

    let mut remaining = regions;
    for file_id in 0..num_files {
        let group_len = remaining
            .iter()
            .take_while(|region| region.file_id as usize == file_id)
            .count();
        let (group, rest) = remaining.split_at(group_len);
        remaining = rest;

        write_uleb128_usize(out, file_id);
        write_uleb128_usize(out, group.len());

        let mut previous_line = 0;
        for region in group {
            let header = (region.counter.to_tag() << raw::REGION_KIND_BITS) | region.kind.code();
            write_uleb128(out, header);
            match region.kind {
                RegionKind::Expansion { expanded_file_id } => {
                    write_uleb128_u32(out, expanded_file_id)
                }
                RegionKind::Branch { false_counter } => write_uleb128(out, false_counter.to_tag()),
                _ => {}
            }

            write_uleb128_u32(out, region.line_start - previous_line);
            write_uleb128_u32(out, region.column_start);
            write_uleb128_u32(out, region.line_end - region.line_start);
            write_uleb128_u32(out, region.column_end);
            previous_line = region.line_start;
        }
    }
    Ok(())
}
