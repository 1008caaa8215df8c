//! Function records: the per-function header followed by its mapping payload.

use std::convert::TryFrom;

use scroll::ctx::SizeWith;
use scroll::{Endian, Pwrite};

#[cfg(feature = "serde")]
use serde_::{Deserialize, Serialize};

use super::mapping::CoverageMappingWriter;
use super::regions::MappingRegion;
use crate::counter::CounterExpression;
use crate::error::{EncodingError, HeaderError};
use crate::format::raw::FunctionRecord;

/// Everything needed to write the coverage mapping of one function.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(crate = "serde_"))]
pub struct FunctionCoverageRecord {
    /// Hash of the function's (mangled) name.
    pub function_name_hash: u64,
    /// Indices into the module-wide filename table, one per function-local file id.
    pub file_ids: Vec<u32>,
    /// The function's counter expressions.
    pub expressions: Vec<CounterExpression>,
    /// The function's regions, sorted by `(file_id, line_start, column_start)`.
    pub regions: Vec<MappingRegion>,
    /// Hash of the function's structure.
    pub structural_hash: u64,
}

impl FunctionCoverageRecord {
    /// Encodes the mapping payload without the function header.
    pub fn payload(&self) -> Result<Vec<u8>, EncodingError> {
        CoverageMappingWriter::new(&self.file_ids, &self.expressions, &self.regions).to_vec()
    }

    /// Builds the function header for an encoded payload.
    pub fn header(&self, payload: &[u8]) -> Result<FunctionRecord, EncodingError> {
        let data_size =
            u32::try_from(payload.len()).map_err(|_| EncodingError::TooLarge("function payload"))?;
        Ok(FunctionRecord {
            name_hash: self.function_name_hash,
            data_size,
            func_hash: self.structural_hash,
        })
    }

    /// Encodes the function header followed by the mapping payload.
    pub fn to_bytes(&self, endian: Endian) -> Result<Vec<u8>, EncodingError> {
        let payload = self.payload()?;
        let header = self.header(&payload)?;

        let mut out = Vec::with_capacity(FunctionRecord::size_with(&endian) + payload.len());
        write_pod(&mut out, header, endian)?;
        out.extend_from_slice(&payload);
        Ok(out)
    }
}

/// Appends a fixed-size header struct in the given byte order.
pub(crate) fn write_pod<T>(out: &mut Vec<u8>, value: T, endian: Endian) -> Result<(), EncodingError>
where
    T: SizeWith<Endian> + scroll::ctx::TryIntoCtx<Endian, Error = scroll::Error>,
{
    let offset = out.len();
    out.resize(offset + T::size_with(&endian), 0);
    out.pwrite_with(value, offset, endian)
        .map_err(HeaderError::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::Counter;
    use crate::format::Function;

    fn record() -> FunctionCoverageRecord {
        FunctionCoverageRecord {
            function_name_hash: 0x0102_0304_0506_0708,
            file_ids: vec![0],
            expressions: vec![],
            regions: vec![MappingRegion::code(
                Counter::CounterValueReference(0),
                0,
                1,
                1,
                3,
                2,
            )],
            structural_hash: 0x1122_3344_5566_7788,
        }
    }

    #[test]
    fn header_layout() {
        let little = record().to_bytes(Endian::Little).unwrap();
        let big = record().to_bytes(Endian::Big).unwrap();
        let payload = record().payload().unwrap();

        assert_eq!(little.len(), 20 + payload.len());
        assert_eq!(&little[..8], &0x0102_0304_0506_0708u64.to_le_bytes());
        assert_eq!(&little[8..12], &(payload.len() as u32).to_le_bytes());
        assert_eq!(&little[12..20], &0x1122_3344_5566_7788u64.to_le_bytes());
        assert_eq!(&big[..8], &0x0102_0304_0506_0708u64.to_be_bytes());
        assert_eq!(&big[8..12], &(payload.len() as u32).to_be_bytes());
        assert_eq!(&little[20..], &payload[..]);
        assert_eq!(&big[20..], &payload[..]);
    }

    #[test]
    fn parses_back() {
        let bytes = record().to_bytes(Endian::Big).unwrap();
        let function = Function::parse(&bytes, Endian::Big).unwrap();
        assert_eq!(function.record.name_hash, 0x0102_0304_0506_0708);
        assert_eq!(function.record.func_hash, 0x1122_3344_5566_7788);
        assert_eq!(function.mapping().unwrap().regions, record().regions);
    }

    #[test]
    fn failed_encoding_has_no_header() {
        let mut record = record();
        record.regions[0].line_end = 0;
        assert!(matches!(
            record.to_bytes(Endian::Little),
            Err(EncodingError::MalformedSpan { .. })
        ));
    }
}
