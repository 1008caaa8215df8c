//! The per-function coverage mapping payload.

use std::io::Write;

use super::expressions::{check_counter, encode_expressions};
use super::regions::{encode_regions_into, MappingRegion};
use crate::counter::CounterExpression;
use crate::error::{EncodingError, Error};
use crate::format::varint::{write_uleb128_u32, write_uleb128_usize};

/// Writes the coverage mapping payload of a single function.
///
/// The payload consists of the function's file id list, its expressions and its regions, see
/// [`encode_regions`](super::encode_regions) for the region layout. The payload is always built
/// completely before it is handed out, so a failure never leaves a partially written buffer.
#[derive(Clone, Copy, Debug)]
pub struct CoverageMappingWriter<'a> {
    file_ids: &'a [u32],
    expressions: &'a [CounterExpression],
    regions: &'a [MappingRegion],
}

impl<'a> CoverageMappingWriter<'a> {
    /// Creates a writer.
    ///
    /// `file_ids` maps every function-local file id to an index into the module-wide filename
    /// table. `regions` must be sorted by `(file_id, line_start, column_start)`.
    pub fn new(
        file_ids: &'a [u32],
        expressions: &'a [CounterExpression],
        regions: &'a [MappingRegion],
    ) -> Self {
        Self {
            file_ids,
            expressions,
            regions,
        }
    }

    /// Encodes the payload into a new buffer.
    pub fn to_vec(&self) -> Result<Vec<u8>, EncodingError> {
        for region in self.regions {
            for counter in region.counters() {
                check_counter(counter, self.expressions.len())?;
            }
        }

        let mut out = Vec::new();
        write_uleb128_usize(&mut out, self.file_ids.len());
        for file_id in self.file_ids {
            write_uleb128_u32(&mut out, *file_id);
        }
        encode_expressions(&mut out, self.expressions)?;
        encode_regions_into(&mut out, self.regions, self.file_ids.len())?;
        Ok(out)
    }

    /// Encodes the payload and writes it into `writer`.
    ///
    /// Returns the number of bytes written.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<usize, Error> {
        let buf = self.to_vec()?;
        writer.write_all(&buf)?;
        Ok(buf.len())
    }
}
