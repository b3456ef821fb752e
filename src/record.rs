use byteorder::{LittleEndian, WriteBytesExt};
use crc::{Crc, CRC_32_ISCSI};
use std::fmt;
use std::io::prelude::*;
use std::io::BufWriter;

use crate::codec::{decode_primitive, ByteOrderTag};
use crate::data_encoding::DataEncoding;
use crate::encoded_timeseries::EncodedTimeseries;
use crate::extra_headers::ExtraHeaders;
use crate::header::{MSeed3Header, CRC_OFFSET, FIXED_HEADER_SIZE};
use crate::mseed_error::MSeedError;
use crate::{steim1, steim2};

pub const CASTAGNOLI: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

#[derive(Debug, Clone)]
pub struct MSeed3Record {
    pub header: MSeed3Header,
    pub identifier: String,
    pub extra_headers: ExtraHeaders,
    pub encoded_data: EncodedTimeseries,
}

impl MSeed3Record {
    pub fn new(
        header: MSeed3Header,
        identifier: String,
        extra_headers: ExtraHeaders,
        encoded_data: EncodedTimeseries,
    ) -> MSeed3Record {
        let mut header = header;
        let extra_headers_length = extra_headers.effective_bytes().len() as u16;
        header.recalculated_lengths(
            identifier.len() as u8,
            extra_headers_length,
            encoded_data.byte_len(),
            encoded_data.reconcile_num_samples(header.num_samples),
        );

        MSeed3Record {
            header,
            identifier,
            extra_headers,
            encoded_data,
        }
    }

    /// Read a single record record from the BufRead
    pub fn from_reader<R: BufRead>(buf_reader: &mut R) -> Result<MSeed3Record, MSeedError> {
        let mut buffer = [0; FIXED_HEADER_SIZE];
        let _ = buf_reader
            .by_ref()
            .take(FIXED_HEADER_SIZE as u64)
            .read(&mut buffer)?;
        let mut header = MSeed3Header::from_bytes(&buffer)?;
        // set crc field to zero for crc calculation, header has already read value
        buffer[CRC_OFFSET] = 0;
        buffer[CRC_OFFSET + 1] = 0;
        buffer[CRC_OFFSET + 2] = 0;
        buffer[CRC_OFFSET + 3] = 0;
        let mut digest = CASTAGNOLI.digest();
        digest.update(&buffer);

        let mut buffer = Vec::new();
        let _ = buf_reader
            .by_ref()
            .take(header.raw_identifier_length() as u64)
            .read_to_end(&mut buffer)?;
        digest.update(&buffer);
        let identifier = String::from_utf8(buffer)?;

        let mut json_reader = buf_reader
            .by_ref()
            .take(header.raw_extra_headers_length() as u64);
        let mut buffer = Vec::new();
        let _ = json_reader.read_to_end(&mut buffer)?;
        digest.update(&buffer);
        let extra_headers_str = if header.raw_extra_headers_length() > 2 {
            String::from_utf8(buffer)?
        } else {
            String::from("{}")
        };
        let expected_data_length = match header.encoding {
            DataEncoding::INT16 | DataEncoding::DWWSSN => 2 * header.num_samples,
            DataEncoding::INT32 => 4 * header.num_samples,
            DataEncoding::FLOAT32 => 4 * header.num_samples,
            DataEncoding::FLOAT64 => 8 * header.num_samples,
            _ => header.raw_data_length(),
        };
        if header.raw_data_length() != expected_data_length {
            return Err(MSeedError::DataLength(
                expected_data_length,
                header.num_samples,
                header.encoding.value(),
                header.raw_data_length(),
            ));
        }

        let mut encoded_data = Vec::new();
        let _ = buf_reader
            .by_ref()
            .take(header.raw_data_length() as u64)
            .read_to_end(&mut encoded_data)?;
        digest.update(&encoded_data);
        let crc_calc = digest.finalize();
        if crc_calc != header.crc {
            return Err(MSeedError::CrcInvalid(crc_calc, header.crc));
        }
        let encoded_data = EncodedTimeseries::Raw(encoded_data);
        header.num_samples = encoded_data.reconcile_num_samples(header.num_samples);
        Ok(MSeed3Record {
            header,
            identifier,
            extra_headers: ExtraHeaders::from(extra_headers_str),
            encoded_data,
        })
    }

    /// Writes the record, after calculating the CRC. The returned tuple contains the number
    /// of bytes written and the CRC value.
    /// This does recalculate the identifier length, extra headers length and data length headers.
    /// The number of samples is sanity checked against the data, but trusts the header in cases
    /// of compressed or opaque data.
    pub fn write_to<W>(&mut self, buf: &mut BufWriter<W>) -> Result<(u32, u32), MSeedError>
    where
        W: std::io::Write,
    {
        self.header.crc = 0;
        let mut out = Vec::new();
        {
            let mut inner_buf = BufWriter::new(&mut out);
            self.write_to_wocrc(&mut inner_buf)?;
            inner_buf.flush()?;
        }
        let crc = CASTAGNOLI.checksum(&out);
        self.header.crc = crc;
        buf.write_all(&out[0..CRC_OFFSET])?;
        buf.write_u32::<LittleEndian>(crc)?;
        buf.write_all(&out[(CRC_OFFSET + 4)..])?;
        Ok((out.len() as u32, crc))
    }

    /// Writes the record to the given buffer without checking, calculating or setting the header CRC field.
    /// This does recalculate the identifier length, extra headers length and data length headers.
    /// The number of samples is sanity checked against the data, but trusts the header in cases
    /// of compressed or opaque data.
    pub fn write_to_wocrc<W>(&mut self, buf: &mut BufWriter<W>) -> Result<(), MSeedError>
    where
        W: std::io::Write,
    {
        let id_bytes = self.identifier.as_bytes();
        let identifier_length = id_bytes.len() as u8;
        let data_length = self.encoded_data.byte_len();
        let num_samples = self
            .encoded_data
            .reconcile_num_samples(self.header.num_samples);

        let eh_bytes = self.extra_headers.effective_bytes();
        let extra_headers_length = eh_bytes.len() as u16;
        self.header.recalculated_lengths(
            identifier_length,
            extra_headers_length,
            data_length,
            num_samples,
        );
        self.header.write_to(buf)?;
        buf.write_all(id_bytes)?;
        if !eh_bytes.is_empty() {
            buf.write_all(&eh_bytes)?;
        }
        self.encoded_data.write_to(buf)?;
        buf.flush()?;
        Ok(())
    }

    pub fn parse_extra_headers(&mut self) -> Result<(), MSeedError> {
        self.extra_headers.parse()
    }

    pub fn parsed_json(&mut self) -> Result<serde_json::Value, MSeedError> {
        self.extra_headers.to_json_value()
    }

    pub fn get_record_size(&self) -> u32 {
        self.header.get_record_size()
    }

    /// Decompresses the payload into a primitive sample array, applying
    /// Steim1/Steim2 decoding as needed. `bias` is the X(-1) integration
    /// constant carried over from the previous record for the same
    /// channel, 0 if this is the first record.
    pub fn decompressed_samples(&self, bias: i32) -> Result<Vec<i32>, MSeedError> {
        let bytes = match &self.encoded_data {
            EncodedTimeseries::Raw(b) => b.as_slice(),
            EncodedTimeseries::Steim1(b) => b.as_slice(),
            EncodedTimeseries::Steim2(b) => b.as_slice(),
            _ => {
                return Err(MSeedError::Compression(String::from(
                    "decompressed_samples only applies to raw or Steim-encoded payloads",
                )))
            }
        };
        match self.header.encoding {
            DataEncoding::STEIM1 => {
                steim1::decode_with_bias(bytes, self.header.num_samples, bias, false)
            }
            DataEncoding::STEIM2 => {
                steim2::decode_with_bias(bytes, self.header.num_samples, bias, false)
            }
            DataEncoding::INT32 => {
                match decode_primitive(
                    &DataEncoding::INT32,
                    bytes,
                    self.header.num_samples,
                    ByteOrderTag::Little,
                )? {
                    EncodedTimeseries::Int32(v) => Ok(v),
                    _ => unreachable!(),
                }
            }
            other => Err(MSeedError::Compression(format!(
                "decompressed_samples does not support encoding {}",
                other
            ))),
        }
    }

    /// One line compact description, used when listing many records:
    /// `"{identifier} {starttime} {endtime} ({numSamples} pts)"`.
    pub fn summary(&self) -> String {
        let start = self
            .header
            .get_start_as_iso()
            .unwrap_or_else(|_| String::from("invalid"));
        let end = self
            .header
            .get_end_as_utc()
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string())
            .unwrap_or_else(|_| String::from("invalid"));
        format!(
            "{} {} {} ({} pts)",
            self.identifier, start, end, self.header.num_samples
        )
    }
}

impl fmt::Display for MSeed3Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "  {}, {}", self.identifier, self.header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_dummy_header() -> [u8; 64] {
        let buf: [u8; 64] = [
            0x4d, 0x53, 0x03, 0x04, 0x00, 0x00, 0x00, 0x00, 0xdc, 0x07, 0x01, 0x00, 0x00, 0x00,
            0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xf0, 0x3f, 0x90, 0x01, 0x00, 0x00,
            0xd6, 0x87, 0xd2, 0x04, 0x01, 0x13, 0x00, 0x00, 0x20, 0x03, 0x00, 0x00, 0x46, 0x44,
            0x53, 0x4e, 0x3a, 0x58, 0x58, 0x5f, 0x54, 0x45, 0x53, 0x54, 0x5f, 0x5f, 0x4c, 0x5f,
            0x48, 0x5f, 0x5a, 0x00, 0x00, 0x02, 0x00, 0x04,
        ];
        buf
    }

    #[test]
    fn record_round_trip() -> Result<(), MSeedError> {
        let buf = &get_dummy_header()[0..FIXED_HEADER_SIZE];
        let identifier =
            String::from_utf8(get_dummy_header()[FIXED_HEADER_SIZE..64].to_owned()).unwrap();

        let mut head = MSeed3Header::from_bytes(buf)?;
        let dummy_data = vec![0_i32, -1, 2, -3, 4, -5];
        head.encoding = DataEncoding::INT32;
        let extra_headers = ExtraHeaders::new();
        let encoded_data = EncodedTimeseries::Int32(dummy_data);
        let mut rec = MSeed3Record::new(head, identifier, extra_headers, encoded_data);
        let mut out = Vec::new();
        let bytes_written: u32;
        {
            let mut buf_writer = BufWriter::new(&mut out);
            let t = rec.write_to(&mut buf_writer)?;
            bytes_written = t.0;
            buf_writer.flush()?;
        }
        assert_eq!(rec.get_record_size(), out.len() as u32);
        assert_eq!(bytes_written, out.len() as u32);
        Ok(())
    }

    #[test]
    fn summary_matches_identifier_starttime_endtime_pts_format() -> Result<(), MSeedError> {
        use chrono::{DateTime, Utc};
        let start = "2021-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let header = MSeed3Header::new(start, DataEncoding::INT32, 1.0, 5);
        let rec = MSeed3Record::new(
            header,
            String::from("FDSN:XX_TEST__L_H_Z"),
            ExtraHeaders::new(),
            EncodedTimeseries::Int32(vec![0, 1, 2, 3, 4]),
        );
        assert_eq!(
            rec.summary(),
            "FDSN:XX_TEST__L_H_Z 2021-01-01T00:00:00.000000000Z \
             2021-01-01T00:00:04.000000000Z (5 pts)"
        );
        Ok(())
    }
}
