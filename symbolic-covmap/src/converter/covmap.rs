//! Assembly of the module-wide coverage map section.

use std::convert::TryFrom;
use std::io::Write;

use scroll::Endian;

use super::filenames::FilenameTable;
use super::record::{write_pod, FunctionCoverageRecord};
use crate::error::{EncodingError, Error};
use crate::format::raw;
use crate::object::COVMAP_VERSION;

/// Collects the function records of a module and writes the coverage map section.
///
/// The section starts with a [`CovMapHeader`](raw::CovMapHeader), followed by one
/// [`FunctionRecord`](raw::FunctionRecord) per function, the filenames section, and all function
/// payloads. The payloads are padded with zeroes so that the filenames and payloads together end
/// on an eight byte boundary.
#[derive(Clone, Debug)]
pub struct CoverageMapWriter {
    endian: Endian,
    records: Vec<raw::FunctionRecord>,
    payloads: Vec<u8>,
}

impl CoverageMapWriter {
    /// Creates an empty writer for the given target byte order.
    pub fn new(endian: Endian) -> Self {
        Self {
            endian,
            records: Vec::new(),
            payloads: Vec::new(),
        }
    }

    /// Number of functions added so far.
    pub fn num_functions(&self) -> usize {
        self.records.len()
    }

    /// Encodes a function and appends it to the section.
    ///
    /// A function that fails to encode is not added.
    pub fn add_function(&mut self, record: &FunctionCoverageRecord) -> Result<(), EncodingError> {
        let payload = record.payload()?;
        let header = record.header(&payload)?;
        log::trace!(
            "adding function {:#x} with {} bytes of mapping data",
            header.name_hash,
            header.data_size
        );
        self.records.push(header);
        self.payloads.extend_from_slice(&payload);
        Ok(())
    }

    /// Finishes the section, using `filenames` as the module-wide filename table.
    pub fn finish(self, filenames: &FilenameTable) -> Result<Vec<u8>, EncodingError> {
        let filenames = filenames.to_section_bytes();

        let n_records =
            u32::try_from(self.records.len()).map_err(|_| EncodingError::TooLarge("record count"))?;
        let filenames_size = u32::try_from(filenames.len())
            .map_err(|_| EncodingError::TooLarge("filenames section"))?;
        let padding = raw::align_to_eight(filenames.len() + self.payloads.len());
        let coverage_size = u32::try_from(self.payloads.len() + padding)
            .map_err(|_| EncodingError::TooLarge("coverage data"))?;

        let header = raw::CovMapHeader {
            n_records,
            filenames_size,
            coverage_size,
            version: COVMAP_VERSION,
        };

        let mut out = Vec::new();
        write_pod(&mut out, header, self.endian)?;
        for record in self.records {
            write_pod(&mut out, record, self.endian)?;
        }
        out.extend_from_slice(&filenames);
        out.extend_from_slice(&self.payloads);
        out.resize(out.len() + padding, 0);

        log::debug!(
            "assembled coverage map: {} functions, {} filename bytes, {} coverage bytes",
            n_records,
            filenames_size,
            coverage_size
        );
        Ok(out)
    }

    /// Finishes the section and writes it into the given [`Write`].
    pub fn serialize<W: Write>(
        self,
        filenames: &FilenameTable,
        writer: &mut W,
    ) -> Result<Stats, Error> {
        let num_functions = self.records.len();
        let num_filenames = filenames.len();
        let buf = self.finish(filenames)?;
        writer.write_all(&buf)?;
        Ok(Stats {
            num_functions,
            num_filenames,
            size: buf.len(),
        })
    }
}

/// Some statistics about a serialized coverage map section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct Stats {
    /// Number of function records.
    pub num_functions: usize,
    /// Number of entries in the filename table.
    pub num_filenames: usize,
    /// Total size of the section in bytes.
    pub size: usize,
}
