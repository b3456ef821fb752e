//! Legacy fixed-length miniSEED v2 container: 48-byte fixed header, a
//! linked chain of blockettes, and an encoded payload. Byte order is either
//! explicit (from Blockette 1000) or guessed from the plausible year bytes
//! at offsets 20/21.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::convert::TryInto;

use crate::codec::{decode_primitive, ByteOrderTag};
use crate::data_encoding::DataEncoding;
use crate::encoded_timeseries::EncodedTimeseries;
use crate::mseed_error::MSeedError;
use crate::{steim1, steim2};

pub const HEADER_SIZE: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BTime {
    pub year: u16,
    pub day_of_year: u16,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub tenth_milli: u16,
}

#[derive(Debug, Clone)]
pub enum Blockette {
    B100 {
        next_offset: u16,
        sample_rate: f32,
    },
    B1000 {
        next_offset: u16,
        encoding: u8,
        byte_order: u8,
        record_length_exp: u8,
    },
    B1001 {
        next_offset: u16,
        time_quality: u8,
        microseconds: i8,
        frame_count: u8,
    },
    Unknown {
        blockette_num: u16,
        next_offset: u16,
        raw_bytes: Vec<u8>,
    },
}

impl Blockette {
    pub fn next_offset(&self) -> u16 {
        match self {
            Blockette::B100 { next_offset, .. } => *next_offset,
            Blockette::B1000 { next_offset, .. } => *next_offset,
            Blockette::B1001 { next_offset, .. } => *next_offset,
            Blockette::Unknown { next_offset, .. } => *next_offset,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MSeed2Header {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub data_quality: u8,
    pub start_btime: BTime,
    pub num_samples: u16,
    pub samp_rate_factor: i16,
    pub samp_rate_mult: i16,
    pub act_flag: u8,
    pub io_flag: u8,
    pub qual_flag: u8,
    pub num_blockettes: u8,
    pub time_correction: i32,
    pub data_offset: u16,
    pub blockette_offset: u16,
    pub encoding: DataEncoding,
    pub byte_order: ByteOrderTag,
    pub record_length_exp: u8,
}

impl MSeed2Header {
    /// Nominal sample rate in Hz, derived from the factor/multiplier pair
    /// the way the SEED manual describes: positive factor means samples
    /// per second, positive multiplier means a repeat count multiplying
    /// that rate; negative values invert their role into a divisor.
    pub fn sample_rate(&self) -> f64 {
        let (factor, mult) = (self.samp_rate_factor as f64, self.samp_rate_mult as f64);
        if factor == 0.0 || mult == 0.0 {
            return 0.0;
        }
        if factor > 0.0 {
            if mult > 0.0 {
                factor * mult
            } else {
                -1.0 * factor / mult
            }
        } else if mult > 0.0 {
            -1.0 * mult / factor
        } else {
            1.0 / (factor * mult)
        }
    }

    /// Derives a SEED factor/multiplier pair that reproduces `rate` to
    /// within i16 precision, clamped away from the type's boundary. Used
    /// when packing a header constructed directly from a rate rather than
    /// parsed from an existing factor/multiplier pair.
    pub fn calc_seed_multiplier_factor(rate: f64) -> (i16, i16) {
        const SHORT_MIN: f64 = -32768.0;
        const SHORT_MAX: f64 = 32767.0;
        if rate == 0.0 {
            return (0, 0);
        }
        if rate >= 1.0 {
            let mut divisor = ((SHORT_MIN + 2.0) / rate).ceil();
            if divisor < SHORT_MIN + 2.0 {
                divisor = SHORT_MIN + 2.0;
            }
            let factor = (-1.0 * rate * divisor).round();
            (factor as i16, divisor as i16)
        } else {
            let mut factor = -1.0 * ((rate * (SHORT_MAX - 2.0)).floor() / rate).round();
            if factor > SHORT_MAX - 2.0 {
                factor = SHORT_MAX - 2.0;
            }
            let divisor = (-1.0 * factor * rate).round();
            (factor as i16, divisor as i16)
        }
    }
}

#[derive(Debug, Clone)]
pub struct MSeed2Record {
    pub header: MSeed2Header,
    pub blockettes: Vec<Blockette>,
    pub encoded_data: Vec<u8>,
}

impl MSeed2Record {
    /// Parses a complete miniSEED2 record (fixed header, blockette chain,
    /// and payload) from a byte slice. `total_record_length` is the
    /// record's declared total size (e.g. from the directory or a known
    /// fixed record length); it bounds how much of `bytes` is the payload.
    pub fn from_bytes(bytes: &[u8], total_record_length: usize) -> Result<MSeed2Record, MSeedError> {
        let byte_order = guess_byte_order(bytes)?;
        let mut header = parse_fixed_header(bytes, byte_order)?;
        let blockettes = parse_blockette_chain(bytes, &mut header, byte_order)?;
        if (header.num_blockettes as usize) != blockettes.len() {
            return Err(MSeedError::BlocketteCountMismatch(
                header.num_blockettes,
                blockettes.len() as u8,
            ));
        }
        let data_offset = header.data_offset as usize;
        let end = total_record_length.min(bytes.len());
        let encoded_data = if data_offset < end {
            bytes[data_offset..end].to_vec()
        } else {
            Vec::new()
        };
        Ok(MSeed2Record {
            header,
            blockettes,
            encoded_data,
        })
    }

    /// Decompresses the payload into int32 samples, dispatching on the
    /// header's declared encoding and byte order.
    pub fn decompressed_samples(&self) -> Result<Vec<i32>, MSeedError> {
        match self.header.encoding {
            DataEncoding::STEIM1 => {
                steim1::decode(&self.encoded_data, self.header.num_samples as u32)
            }
            DataEncoding::STEIM2 => {
                steim2::decode(&self.encoded_data, self.header.num_samples as u32)
            }
            DataEncoding::INT16 | DataEncoding::DWWSSN => {
                match decode_primitive(
                    &DataEncoding::INT16,
                    &self.encoded_data,
                    self.header.num_samples as u32,
                    self.header.byte_order,
                )? {
                    EncodedTimeseries::Int16(v) => Ok(v.into_iter().map(i32::from).collect()),
                    _ => unreachable!(),
                }
            }
            DataEncoding::INT32 => {
                match decode_primitive(
                    &DataEncoding::INT32,
                    &self.encoded_data,
                    self.header.num_samples as u32,
                    self.header.byte_order,
                )? {
                    EncodedTimeseries::Int32(v) => Ok(v),
                    _ => unreachable!(),
                }
            }
            other => Err(MSeedError::UnknownEncoding(other.value())),
        }
    }
}

/// Inspects the BTime year bytes (offsets 20, 21) for a plausible leading
/// byte (0x07 or 0x08, i.e. years 17xx-22xx big-endian). If exactly one
/// candidate byte order matches, that order is used; otherwise the record
/// is rejected as undetectable.
pub fn guess_byte_order(bytes: &[u8]) -> Result<ByteOrderTag, MSeedError> {
    if bytes.len() < HEADER_SIZE {
        return Err(MSeedError::InsufficientBytes(bytes.len(), HEADER_SIZE));
    }
    let plausible = |b: u8| b == 7 || b == 8;
    let big_plausible = plausible(bytes[20]);
    let little_plausible = plausible(bytes[21]);
    if big_plausible && !little_plausible {
        Ok(ByteOrderTag::Big)
    } else if little_plausible && !big_plausible {
        Ok(ByteOrderTag::Little)
    } else {
        Err(MSeedError::UnknownByteOrder)
    }
}

pub(crate) fn parse_fixed_header(bytes: &[u8], order: ByteOrderTag) -> Result<MSeed2Header, MSeedError> {
    if bytes.len() < HEADER_SIZE {
        return Err(MSeedError::InsufficientBytes(bytes.len(), HEADER_SIZE));
    }
    let data_quality = bytes[6];
    let station = String::from_utf8_lossy(&bytes[8..13]).trim().to_string();
    let location = String::from_utf8_lossy(&bytes[13..15]).trim().to_string();
    let channel = String::from_utf8_lossy(&bytes[15..18]).trim().to_string();
    let network = String::from_utf8_lossy(&bytes[18..20]).trim().to_string();

    let (year, yday, num_samples, factor, mult);
    let (tenth_milli, act_flag, io_flag, qual_flag, num_blockettes, time_correction, data_offset, blockette_offset);
    match order {
        ByteOrderTag::Big => {
            year = BigEndian::read_u16(&bytes[20..22]);
            yday = BigEndian::read_u16(&bytes[22..24]);
            tenth_milli = BigEndian::read_u16(&bytes[27..29]);
            num_samples = BigEndian::read_u16(&bytes[30..32]);
            factor = BigEndian::read_i16(&bytes[32..34]);
            mult = BigEndian::read_i16(&bytes[34..36]);
            time_correction = BigEndian::read_i32(&bytes[40..44]);
            data_offset = BigEndian::read_u16(&bytes[44..46]);
            blockette_offset = BigEndian::read_u16(&bytes[46..48]);
        }
        ByteOrderTag::Little => {
            year = LittleEndian::read_u16(&bytes[20..22]);
            yday = LittleEndian::read_u16(&bytes[22..24]);
            tenth_milli = LittleEndian::read_u16(&bytes[27..29]);
            num_samples = LittleEndian::read_u16(&bytes[30..32]);
            factor = LittleEndian::read_i16(&bytes[32..34]);
            mult = LittleEndian::read_i16(&bytes[34..36]);
            time_correction = LittleEndian::read_i32(&bytes[40..44]);
            data_offset = LittleEndian::read_u16(&bytes[44..46]);
            blockette_offset = LittleEndian::read_u16(&bytes[46..48]);
        }
    }
    let hour = bytes[24];
    let minute = bytes[25];
    let second = bytes[26];
    act_flag = bytes[36];
    io_flag = bytes[37];
    qual_flag = bytes[38];
    num_blockettes = bytes[39];

    Ok(MSeed2Header {
        network,
        station,
        location,
        channel,
        data_quality,
        start_btime: BTime {
            year,
            day_of_year: yday,
            hour,
            minute,
            second,
            tenth_milli,
        },
        num_samples,
        samp_rate_factor: factor,
        samp_rate_mult: mult,
        act_flag,
        io_flag,
        qual_flag,
        num_blockettes,
        time_correction,
        data_offset,
        blockette_offset,
        encoding: DataEncoding::UNKNOWN(0),
        byte_order: order,
        record_length_exp: 9,
    })
}

/// Parses the blockette chain starting at `header.blockette_offset`,
/// rejecting any chain whose `nextOffset` fails to strictly increase
/// (a cycle or self-loop) instead of following it forever. Recognized
/// blockettes (100, 1000, 1001) update `header` as they are encountered.
pub(crate) fn parse_blockette_chain(
    bytes: &[u8],
    header: &mut MSeed2Header,
    byte_order: ByteOrderTag,
) -> Result<Vec<Blockette>, MSeedError> {
    let mut blockettes = Vec::new();
    if header.num_blockettes == 0 {
        return Ok(blockettes);
    }
    let mut offset = header.blockette_offset;
    let mut prev_offset: u16 = 0;
    while offset != 0 {
        if offset <= prev_offset && prev_offset != 0 {
            return Err(MSeedError::BlocketteChainCycle(offset, prev_offset));
        }
        let b = parse_one_blockette(bytes, offset as usize, byte_order)?;
        match &b {
            Blockette::B1000 {
                encoding,
                byte_order: bo,
                record_length_exp,
                ..
            } => {
                header.encoding = DataEncoding::from_int(*encoding);
                header.byte_order = if *bo == 1 {
                    ByteOrderTag::Big
                } else {
                    ByteOrderTag::Little
                };
                header.record_length_exp = *record_length_exp;
            }
            Blockette::B100 { sample_rate, .. } => {
                let rate = *sample_rate as f64;
                let (factor, mult) = MSeed2Header::calc_seed_multiplier_factor(rate);
                header.samp_rate_factor = factor;
                header.samp_rate_mult = mult;
            }
            Blockette::B1001 { microseconds, .. } => {
                add_microseconds(&mut header.start_btime, *microseconds as i64);
            }
            Blockette::Unknown { .. } => {}
        }
        prev_offset = offset;
        let next = b.next_offset();
        blockettes.push(b);
        offset = next;
    }
    if !blockettes
        .iter()
        .any(|b| matches!(b, Blockette::B1000 { .. }))
    {
        return Err(MSeedError::MissingBlockette1000);
    }
    Ok(blockettes)
}

fn add_microseconds(btime: &mut BTime, micros: i64) {
    let total_tenth_milli = btime.tenth_milli as i64 + micros / 100;
    btime.tenth_milli = total_tenth_milli.rem_euclid(10_000) as u16;
}

fn parse_one_blockette(
    bytes: &[u8],
    offset: usize,
    order: ByteOrderTag,
) -> Result<Blockette, MSeedError> {
    if offset + 4 > bytes.len() {
        return Err(MSeedError::SteimShortPayload(offset + 4, bytes.len()));
    }
    let (blockette_num, next_offset) = match order {
        ByteOrderTag::Big => (
            BigEndian::read_u16(&bytes[offset..offset + 2]),
            BigEndian::read_u16(&bytes[offset + 2..offset + 4]),
        ),
        ByteOrderTag::Little => (
            LittleEndian::read_u16(&bytes[offset..offset + 2]),
            LittleEndian::read_u16(&bytes[offset + 2..offset + 4]),
        ),
    };
    match blockette_num {
        1000 => {
            if offset + 8 > bytes.len() {
                return Err(MSeedError::SteimShortPayload(offset + 8, bytes.len()));
            }
            let encoding = bytes[offset + 4];
            let byte_order = bytes[offset + 5];
            let record_length_exp = bytes[offset + 6];
            if !(8..=12).contains(&record_length_exp) {
                return Err(MSeedError::BadRecordLengthExponent(record_length_exp));
            }
            Ok(Blockette::B1000 {
                next_offset,
                encoding,
                byte_order,
                record_length_exp,
            })
        }
        100 => {
            if offset + 8 > bytes.len() {
                return Err(MSeedError::SteimShortPayload(offset + 8, bytes.len()));
            }
            let sample_rate = match order {
                ByteOrderTag::Big => BigEndian::read_f32(&bytes[offset + 4..offset + 8]),
                ByteOrderTag::Little => LittleEndian::read_f32(&bytes[offset + 4..offset + 8]),
            };
            Ok(Blockette::B100 {
                next_offset,
                sample_rate,
            })
        }
        1001 => {
            if offset + 8 > bytes.len() {
                return Err(MSeedError::SteimShortPayload(offset + 8, bytes.len()));
            }
            let time_quality = bytes[offset + 4];
            let microseconds = bytes[offset + 5] as i8;
            let frame_count = bytes[offset + 7];
            Ok(Blockette::B1001 {
                next_offset,
                time_quality,
                microseconds,
                frame_count,
            })
        }
        other => {
            let end = if next_offset == 0 {
                bytes.len().min(offset + 4)
            } else {
                (next_offset as usize).min(bytes.len())
            };
            let raw_bytes = bytes[offset..end.max(offset + 4)].to_vec();
            Ok(Blockette::Unknown {
                blockette_num: other,
                next_offset,
                raw_bytes,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_fixed_record(byte_order: ByteOrderTag) -> Vec<u8> {
        let mut buf = vec![0_u8; 512];
        buf[0..6].copy_from_slice(b"000001");
        buf[6] = b'D';
        buf[8..13].copy_from_slice(b"ABCD ");
        buf[13..15].copy_from_slice(b"00");
        buf[15..18].copy_from_slice(b"HHZ");
        buf[18..20].copy_from_slice(b"XX");
        let write_u16 = |buf: &mut [u8], off: usize, v: u16, big: bool| {
            if big {
                BigEndian::write_u16(&mut buf[off..off + 2], v)
            } else {
                LittleEndian::write_u16(&mut buf[off..off + 2], v)
            }
        };
        let big = byte_order == ByteOrderTag::Big;
        write_u16(&mut buf, 20, 2024, big);
        write_u16(&mut buf, 22, 5, big);
        buf[24] = 1;
        buf[25] = 2;
        buf[26] = 3;
        write_u16(&mut buf, 30, 4, big);
        if big {
            BigEndian::write_i16(&mut buf[32..34], 1);
            BigEndian::write_i16(&mut buf[34..36], 1);
        } else {
            LittleEndian::write_i16(&mut buf[32..34], 1);
            LittleEndian::write_i16(&mut buf[34..36], 1);
        }
        buf[39] = 1;
        write_u16(&mut buf, 44, 56, big);
        write_u16(&mut buf, 46, 48, big);
        // blockette 1000 at offset 48
        if big {
            BigEndian::write_u16(&mut buf[48..50], 1000);
            BigEndian::write_u16(&mut buf[50..52], 0);
        } else {
            LittleEndian::write_u16(&mut buf[48..50], 1000);
            LittleEndian::write_u16(&mut buf[50..52], 0);
        }
        buf[52] = 3; // INT32
        buf[53] = if big { 1 } else { 0 };
        buf[54] = 9;
        // data at offset 56: 4 int32 samples
        let samples = [1_i32, -2, 3, -4];
        for (i, s) in samples.iter().enumerate() {
            if big {
                BigEndian::write_i32(&mut buf[56 + i * 4..60 + i * 4], *s);
            } else {
                LittleEndian::write_i32(&mut buf[56 + i * 4..60 + i * 4], *s);
            }
        }
        buf
    }

    #[test]
    fn guess_big_endian() -> Result<(), MSeedError> {
        let buf = build_fixed_record(ByteOrderTag::Big);
        assert_eq!(guess_byte_order(&buf)?, ByteOrderTag::Big);
        Ok(())
    }

    #[test]
    fn parse_record_and_decompress() -> Result<(), MSeedError> {
        let buf = build_fixed_record(ByteOrderTag::Little);
        let rec = MSeed2Record::from_bytes(&buf, 512)?;
        assert_eq!(rec.header.network, "XX");
        assert_eq!(rec.header.station, "ABCD");
        assert_eq!(rec.header.channel, "HHZ");
        assert_eq!(rec.header.encoding, DataEncoding::INT32);
        let samples = rec.decompressed_samples()?;
        assert_eq!(samples, vec![1, -2, 3, -4]);
        Ok(())
    }

    #[test]
    fn cyclic_blockette_chain_is_rejected() {
        let mut buf = build_fixed_record(ByteOrderTag::Little);
        // make B1000's nextOffset point back at itself: a cycle.
        LittleEndian::write_u16(&mut buf[50..52], 48);
        assert!(MSeed2Record::from_bytes(&buf, 512).is_err());
    }
}
