//! A library for reading and writing miniSEED3, with support for reading
//! legacy miniSEED2 and converting it to v3.
//!
//! See the specification at <https://github.com/iris-edu/miniSEED3> or
//! <https://docs.fdsn.org/projects/miniSEED3> once approved by FDSN.

mod codec;
mod convert;
mod data_encoding;
mod encoded_timeseries;
mod extra_headers;
mod fdsn_source_identifier;
mod header;
mod merge;
mod miniseed2;
mod mseed_error;
mod reader;
mod record;
mod steim1;
mod steim2;
mod steim_frame_block;

use std::io::BufRead;

pub use self::convert::{mseed2to3, UNKNOWN_DATA_VERSION};
pub use self::data_encoding::DataEncoding;
pub use self::encoded_timeseries::EncodedTimeseries;
pub use self::extra_headers::ExtraHeaders;
pub use self::fdsn_source_identifier::FdsnSourceIdentifier;
pub use self::header::{MSeed3Header, CRC_OFFSET, FIXED_HEADER_SIZE};
pub use self::merge::{are_compatible, merge, DEFAULT_TIME_TOL_FACTOR};
pub use self::miniseed2::{BTime, Blockette, MSeed2Header, MSeed2Record};
pub use self::mseed_error::MSeedError;
pub use self::reader::{MSeed2RecordReader, MSeed3RecordReader, ReaderConfig};
pub use self::record::MSeed3Record;

/// Reads every miniSEED3 record from a reader into memory. For large files,
/// prefer [`MSeed3RecordReader`], which streams records one at a time.
pub fn read_mseed3<R: BufRead>(buf_reader: &mut R) -> Result<Vec<MSeed3Record>, MSeedError> {
    let mut records: Vec<MSeed3Record> = Vec::new();
    while !buf_reader.fill_buf()?.is_empty() {
        records.push(MSeed3Record::from_reader(&mut buf_reader.by_ref())?);
    }
    Ok(records)
}

/// Reads every miniSEED2 record from a reader into memory, converting each
/// to miniSEED3 along the way.
pub fn read_mseed2_as_mseed3<R: BufRead>(
    buf_reader: &mut R,
) -> Result<Vec<MSeed3Record>, MSeedError> {
    let reader = reader::MSeed2RecordReader::new(buf_reader);
    reader
        .map(|r| r.and_then(|rec| mseed2to3(&rec)))
        .collect()
}
