//! Pull-style streaming readers for miniSEED3 and miniSEED2 files: read one
//! record at a time without holding the whole file in memory, with optional
//! identifier filtering, CRC verification, and one-slot look-behind merging.

use std::io::BufRead;

use regex::Regex;

use crate::header::{MSeed3Header, CRC_OFFSET, FIXED_HEADER_SIZE};
use crate::merge::{self, DEFAULT_TIME_TOL_FACTOR};
use crate::miniseed2::{parse_blockette_chain, parse_fixed_header, guess_byte_order, MSeed2Record, HEADER_SIZE};
use crate::mseed_error::MSeedError;
use crate::record::{MSeed3Record, CASTAGNOLI};

/// Configuration for a [`MSeed3RecordReader`].
#[derive(Clone, Default)]
pub struct ReaderConfig {
    /// Verify each record's CRC-32C on read. Default on.
    pub check_crc: bool,
    /// Only records whose identifier matches this pattern are yielded;
    /// others are skipped without decoding their payload.
    pub identifier_filter: Option<Regex>,
    /// When true, adjacent compatible records are merged before being
    /// yielded, using a one-record look-behind.
    pub merge: bool,
    /// Gap tolerance factor passed to [`crate::merge::are_compatible`].
    pub merge_time_tol_factor: f64,
}

impl ReaderConfig {
    pub fn new() -> ReaderConfig {
        ReaderConfig {
            check_crc: true,
            identifier_filter: None,
            merge: false,
            merge_time_tol_factor: DEFAULT_TIME_TOL_FACTOR,
        }
    }
}

/// Streaming reader over a sequence of miniSEED3 records.
pub struct MSeed3RecordReader<R: BufRead> {
    reader: R,
    config: ReaderConfig,
    pending: Option<MSeed3Record>,
    done: bool,
}

impl<R: BufRead> MSeed3RecordReader<R> {
    pub fn new(reader: R, config: ReaderConfig) -> MSeed3RecordReader<R> {
        MSeed3RecordReader {
            reader,
            config,
            pending: None,
            done: false,
        }
    }

    /// Reads and returns the next record not filtered out, applying CRC
    /// verification per the configuration. Returns `Ok(None)` at end of
    /// stream. Records skipped by the identifier filter are logged and
    /// never decoded past their header and identifier.
    fn read_one(&mut self) -> Result<Option<MSeed3Record>, MSeedError> {
        loop {
            let mut header_buf = [0_u8; FIXED_HEADER_SIZE];
            let n = read_fill(&mut self.reader, &mut header_buf)?;
            if n == 0 {
                return Ok(None);
            }
            if n < FIXED_HEADER_SIZE {
                return Err(MSeedError::InsufficientBytes(n, FIXED_HEADER_SIZE));
            }
            let mut header = MSeed3Header::from_bytes(&header_buf)?;
            let mut digest = CASTAGNOLI.digest();
            let mut crc_buf = header_buf;
            crc_buf[CRC_OFFSET] = 0;
            crc_buf[CRC_OFFSET + 1] = 0;
            crc_buf[CRC_OFFSET + 2] = 0;
            crc_buf[CRC_OFFSET + 3] = 0;
            digest.update(&crc_buf);

            let mut id_buf = vec![0_u8; header.raw_identifier_length() as usize];
            read_exact_err(&mut self.reader, &mut id_buf)?;
            digest.update(&id_buf);
            let identifier = String::from_utf8(id_buf)?;

            let matches_filter = self
                .config
                .identifier_filter
                .as_ref()
                .map(|re| re.is_match(&identifier))
                .unwrap_or(true);

            if !matches_filter {
                let skip = header.raw_extra_headers_length() as u64 + header.raw_data_length() as u64;
                log::warn!(
                    "skipping record {} ({} bytes), failed identifier filter",
                    identifier,
                    skip
                );
                skip_bytes(&mut self.reader, skip)?;
                continue;
            }

            let mut eh_buf = vec![0_u8; header.raw_extra_headers_length() as usize];
            read_exact_err(&mut self.reader, &mut eh_buf)?;
            digest.update(&eh_buf);
            let extra_headers_str = if header.raw_extra_headers_length() > 2 {
                String::from_utf8(eh_buf)?
            } else {
                String::from("{}")
            };

            let mut data_buf = vec![0_u8; header.raw_data_length() as usize];
            read_exact_err(&mut self.reader, &mut data_buf)?;
            digest.update(&data_buf);

            let crc_calc = digest.finalize();
            if self.config.check_crc && crc_calc != header.crc {
                log::warn!(
                    "CRC mismatch for record {}: calc {:#010X} header {:#010X}",
                    identifier,
                    crc_calc,
                    header.crc
                );
                return Err(MSeedError::CrcInvalid(crc_calc, header.crc));
            }

            let encoded_data = crate::encoded_timeseries::EncodedTimeseries::Raw(data_buf);
            header.num_samples = encoded_data.reconcile_num_samples(header.num_samples);
            log::debug!(
                "read record {} {} samples encoding {}",
                identifier,
                header.num_samples,
                header.encoding
            );
            return Ok(Some(MSeed3Record {
                header,
                identifier,
                extra_headers: crate::extra_headers::ExtraHeaders::from(extra_headers_str),
                encoded_data,
            }));
        }
    }
}

impl<R: BufRead> Iterator for MSeed3RecordReader<R> {
    type Item = Result<MSeed3Record, MSeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.config.merge {
            return match self.read_one() {
                Ok(Some(rec)) => Some(Ok(rec)),
                Ok(None) => {
                    self.done = true;
                    None
                }
                Err(e) => {
                    self.done = true;
                    Some(Err(e))
                }
            };
        }
        loop {
            match self.read_one() {
                Ok(Some(rec)) => {
                    let prev = self.pending.take();
                    let merged = merge::merge(prev, Some(rec), self.config.merge_time_tol_factor);
                    if merged.len() == 2 {
                        self.pending = merged.into_iter().nth(1).flatten();
                        return merged.into_iter().next().flatten().map(Ok);
                    } else {
                        self.pending = merged.into_iter().next().flatten();
                        continue;
                    }
                }
                Ok(None) => {
                    self.done = true;
                    return self.pending.take().map(Ok);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Streaming reader over a sequence of miniSEED2 records. Unlike v3,
/// total record size is not known until Blockette 1000 is parsed, so each
/// record is read in two passes: the fixed header plus blockette region,
/// then the remaining payload once the record length is known.
pub struct MSeed2RecordReader<R: BufRead> {
    reader: R,
    done: bool,
}

impl<R: BufRead> MSeed2RecordReader<R> {
    pub fn new(reader: R) -> MSeed2RecordReader<R> {
        MSeed2RecordReader { reader, done: false }
    }

    fn read_one(&mut self) -> Result<Option<MSeed2Record>, MSeedError> {
        let mut header_buf = [0_u8; HEADER_SIZE];
        let n = read_fill(&mut self.reader, &mut header_buf)?;
        if n == 0 {
            return Ok(None);
        }
        if n < HEADER_SIZE {
            return Err(MSeedError::InsufficientBytes(n, HEADER_SIZE));
        }
        let byte_order = guess_byte_order(&header_buf)?;
        let mut header = parse_fixed_header(&header_buf, byte_order)?;

        let mut buf = header_buf.to_vec();
        let blockette_region_len = (header.data_offset as usize).saturating_sub(HEADER_SIZE);
        let mut blockette_buf = vec![0_u8; blockette_region_len];
        read_exact_err(&mut self.reader, &mut blockette_buf)?;
        buf.extend_from_slice(&blockette_buf);

        let blockettes = parse_blockette_chain(&buf, &mut header, byte_order)?;
        if (header.num_blockettes as usize) != blockettes.len() {
            return Err(MSeedError::BlocketteCountMismatch(
                header.num_blockettes,
                blockettes.len() as u8,
            ));
        }
        let record_length = 1_usize << header.record_length_exp;
        let remaining = record_length.saturating_sub(buf.len());
        let mut payload_buf = vec![0_u8; remaining];
        read_exact_err(&mut self.reader, &mut payload_buf)?;
        buf.extend_from_slice(&payload_buf);

        let data_offset = header.data_offset as usize;
        let encoded_data = if data_offset < buf.len() {
            buf[data_offset..].to_vec()
        } else {
            Vec::new()
        };
        log::debug!(
            "read miniSEED2 record {}.{}.{}.{} {} samples",
            header.network,
            header.station,
            header.location,
            header.channel,
            header.num_samples
        );
        Ok(Some(MSeed2Record {
            header,
            blockettes,
            encoded_data,
        }))
    }
}

impl<R: BufRead> Iterator for MSeed2RecordReader<R> {
    type Item = Result<MSeed2Record, MSeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_one() {
            Ok(Some(rec)) => Some(Ok(rec)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fills `buf` from `reader`, returning the number of bytes actually read
/// (may be less than `buf.len()` only at end of stream, in which case it
/// is 0 or a short, truncated-record count).
fn read_fill<R: BufRead>(reader: &mut R, buf: &mut [u8]) -> Result<usize, MSeedError> {
    use std::io::Read;
    let mut total = 0;
    while total < buf.len() {
        let n = reader.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

fn read_exact_err<R: BufRead>(reader: &mut R, buf: &mut [u8]) -> Result<(), MSeedError> {
    use std::io::Read;
    reader.read_exact(buf)?;
    Ok(())
}

fn skip_bytes<R: BufRead>(reader: &mut R, mut n: u64) -> Result<(), MSeedError> {
    use std::io::Read;
    let mut sink = [0_u8; 4096];
    while n > 0 {
        let chunk = n.min(sink.len() as u64) as usize;
        reader.read_exact(&mut sink[..chunk])?;
        n -= chunk as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_encoding::DataEncoding;
    use crate::encoded_timeseries::EncodedTimeseries;
    use crate::extra_headers::ExtraHeaders;
    use chrono::{NaiveDate, Utc};
    use std::io::{BufReader, Cursor};

    fn sample_record(identifier: &str, start: chrono::DateTime<Utc>, samples: Vec<i32>) -> MSeed3Record {
        let header = MSeed3Header::new(start, DataEncoding::INT32, 1.0, samples.len());
        MSeed3Record::new(
            header,
            String::from(identifier),
            ExtraHeaders::new(),
            EncodedTimeseries::Int32(samples),
        )
    }

    fn write_record(rec: &mut MSeed3Record) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut buf_writer = std::io::BufWriter::new(&mut out);
            rec.write_to(&mut buf_writer).unwrap();
        }
        out
    }

    #[test]
    fn reads_single_record() -> Result<(), MSeedError> {
        let t0 = NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        let mut rec = sample_record("FDSN:XX_TEST_00_H_H_Z", t0, vec![1, 2, 3, 4]);
        let bytes = write_record(&mut rec);
        let mut reader = MSeed3RecordReader::new(BufReader::new(Cursor::new(bytes)), ReaderConfig::new());
        let read_back = reader.next().unwrap()?;
        assert_eq!(read_back.identifier, "FDSN:XX_TEST_00_H_H_Z");
        assert!(reader.next().is_none());
        Ok(())
    }

    #[test]
    fn identifier_filter_skips_non_matching() -> Result<(), MSeedError> {
        let t0 = NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        let mut rec_a = sample_record("FDSN:XX_AAAA_00_H_H_Z", t0, vec![1, 2]);
        let mut rec_b = sample_record("FDSN:XX_BBBB_00_H_H_Z", t0, vec![3, 4]);
        let mut bytes = write_record(&mut rec_a);
        bytes.extend(write_record(&mut rec_b));
        let mut config = ReaderConfig::new();
        config.identifier_filter = Some(Regex::new("BBBB").unwrap());
        let mut reader = MSeed3RecordReader::new(BufReader::new(Cursor::new(bytes)), config);
        let read_back = reader.next().unwrap()?;
        assert_eq!(read_back.identifier, "FDSN:XX_BBBB_00_H_H_Z");
        assert!(reader.next().is_none());
        Ok(())
    }

    #[test]
    fn tampered_crc_is_rejected() {
        let t0 = NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        let mut rec = sample_record("FDSN:XX_TEST_00_H_H_Z", t0, vec![1, 2, 3, 4]);
        let mut bytes = write_record(&mut rec);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let mut reader = MSeed3RecordReader::new(BufReader::new(Cursor::new(bytes)), ReaderConfig::new());
        assert!(reader.next().unwrap().is_err());
    }

    #[test]
    fn merge_mode_combines_adjacent_records() -> Result<(), MSeedError> {
        let t0 = NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        let mut rec_a = sample_record("FDSN:XX_TEST_00_H_H_Z", t0, vec![1, 2, 3, 4]);
        let t1 = t0 + chrono::Duration::seconds(4);
        let mut rec_b = sample_record("FDSN:XX_TEST_00_H_H_Z", t1, vec![5, 6]);
        let mut bytes = write_record(&mut rec_a);
        bytes.extend(write_record(&mut rec_b));
        let mut config = ReaderConfig::new();
        config.merge = true;
        let mut reader = MSeed3RecordReader::new(BufReader::new(Cursor::new(bytes)), config);
        let merged = reader.next().unwrap()?;
        assert_eq!(merged.header.num_samples, 6);
        assert!(reader.next().is_none());
        Ok(())
    }
}

