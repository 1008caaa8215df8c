//! The raw, fixed-size structures and constants of the coverage mapping format.

use scroll::{Pread, Pwrite, SizeWith};

/// Number of low bits of a packed region header that hold the region kind.
pub const REGION_KIND_BITS: u32 = 3;
/// Mask for the region kind in a packed region header.
pub const REGION_KIND_MASK: u64 = (1 << REGION_KIND_BITS) - 1;

/// Region kind code of a code region.
pub const KIND_CODE: u64 = 0;
/// Region kind code of an expansion region.
pub const KIND_EXPANSION: u64 = 1;
/// Region kind code of a skipped region.
pub const KIND_SKIPPED: u64 = 2;
/// Region kind code of a gap region.
pub const KIND_GAP: u64 = 3;
/// Region kind code of a branch region.
pub const KIND_BRANCH: u64 = 4;

/// The header at the start of a coverage map section.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pread, Pwrite, SizeWith)]
pub struct CovMapHeader {
    /// Number of [`FunctionRecord`]s following the header.
    pub n_records: u32,
    /// Size of the filenames section in bytes.
    pub filenames_size: u32,
    /// Size of all function payloads in bytes, including the trailing padding.
    pub coverage_size: u32,
    /// The format version, see [`COVMAP_VERSION`](crate::COVMAP_VERSION).
    pub version: u32,
}

/// The packed header of a single function's coverage mapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pread, Pwrite, SizeWith)]
pub struct FunctionRecord {
    /// Hash of the function's (mangled) name.
    pub name_hash: u64,
    /// Size of the function's mapping payload in bytes.
    pub data_size: u32,
    /// Hash of the function's structure, used to detect stale profiles.
    pub func_hash: u64,
}

/// Returns the number of padding bytes needed to align `pos` to eight bytes.
pub fn align_to_eight(pos: usize) -> usize {
    let rem = pos % 8;
    if rem == 0 {
        0
    } else {
        8 - rem
    }
}

#[cfg(test)]
mod tests {
    use scroll::ctx::SizeWith;
    use scroll::Endian;

    use super::*;

    #[test]
    fn struct_sizes() {
        assert_eq!(CovMapHeader::size_with(&Endian::Little), 16);
        assert_eq!(FunctionRecord::size_with(&Endian::Little), 20);
    }

    #[test]
    fn alignment() {
        assert_eq!(align_to_eight(0), 0);
        assert_eq!(align_to_eight(1), 7);
        assert_eq!(align_to_eight(8), 0);
        assert_eq!(align_to_eight(13), 3);
    }
}
