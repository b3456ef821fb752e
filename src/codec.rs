//! Fixed-width primitive sample encode/decode: 16/32 bit integers, 32/64 bit
//! floats, and the DWWSSN gain-ranged 16-bit integer encoding, all of which
//! decode to or from an [`EncodedTimeseries`](crate::encoded_timeseries::EncodedTimeseries)
//! without any differencing.

use crate::data_encoding::DataEncoding;
use crate::encoded_timeseries::EncodedTimeseries;
use crate::mseed_error::MSeedError;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Byte order of an encoded payload. miniSEED3 primitive encodings are
/// always little endian; miniSEED2 primitive encodings carry their own
/// byte order flag in the fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrderTag {
    Little,
    Big,
}

/// Decode a primitive (non-Steim) payload into samples, given the declared
/// encoding, sample count and byte order. A record with zero samples always
/// decodes to an empty vector, matching the reference decoder's handling of
/// header-only records such as detection blockettes.
pub fn decode_primitive(
    encoding: &DataEncoding,
    bytes: &[u8],
    num_samples: u32,
    order: ByteOrderTag,
) -> Result<EncodedTimeseries, MSeedError> {
    if num_samples == 0 {
        return Ok(match encoding {
            DataEncoding::FLOAT32 => EncodedTimeseries::Float32(Vec::new()),
            DataEncoding::FLOAT64 => EncodedTimeseries::Float64(Vec::new()),
            DataEncoding::INT32 => EncodedTimeseries::Int32(Vec::new()),
            _ => EncodedTimeseries::Int16(Vec::new()),
        });
    }
    let n = num_samples as usize;
    match encoding {
        DataEncoding::INT16 | DataEncoding::DWWSSN => {
            require_len(bytes, 2 * n)?;
            let mut out = Vec::with_capacity(n);
            for i in 0..n {
                let chunk = &bytes[2 * i..2 * i + 2];
                out.push(match order {
                    ByteOrderTag::Little => LittleEndian::read_i16(chunk),
                    ByteOrderTag::Big => BigEndian::read_i16(chunk),
                });
            }
            Ok(EncodedTimeseries::Int16(out))
        }
        DataEncoding::INT32 => {
            require_len(bytes, 4 * n)?;
            let mut out = Vec::with_capacity(n);
            for i in 0..n {
                let chunk = &bytes[4 * i..4 * i + 4];
                out.push(match order {
                    ByteOrderTag::Little => LittleEndian::read_i32(chunk),
                    ByteOrderTag::Big => BigEndian::read_i32(chunk),
                });
            }
            Ok(EncodedTimeseries::Int32(out))
        }
        DataEncoding::FLOAT32 => {
            require_len(bytes, 4 * n)?;
            let mut out = Vec::with_capacity(n);
            for i in 0..n {
                let chunk = &bytes[4 * i..4 * i + 4];
                out.push(match order {
                    ByteOrderTag::Little => LittleEndian::read_f32(chunk),
                    ByteOrderTag::Big => BigEndian::read_f32(chunk),
                });
            }
            Ok(EncodedTimeseries::Float32(out))
        }
        DataEncoding::FLOAT64 => {
            require_len(bytes, 8 * n)?;
            let mut out = Vec::with_capacity(n);
            for i in 0..n {
                let chunk = &bytes[8 * i..8 * i + 8];
                out.push(match order {
                    ByteOrderTag::Little => LittleEndian::read_f64(chunk),
                    ByteOrderTag::Big => BigEndian::read_f64(chunk),
                });
            }
            Ok(EncodedTimeseries::Float64(out))
        }
        other => Err(MSeedError::UnknownEncoding(other.value())),
    }
}

fn require_len(bytes: &[u8], needed: usize) -> Result<(), MSeedError> {
    if bytes.len() < needed {
        Err(MSeedError::Compression(format!(
            "not enough bytes for {} needed, only {} bytes",
            needed,
            bytes.len()
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_int16_le() -> Result<(), MSeedError> {
        let bytes = [1, 0, 2, 0, 0xff, 0xff];
        let ts = decode_primitive(&DataEncoding::INT16, &bytes, 3, ByteOrderTag::Little)?;
        match ts {
            EncodedTimeseries::Int16(v) => assert_eq!(v, vec![1, 2, -1]),
            _ => panic!("wrong variant"),
        }
        Ok(())
    }

    #[test]
    fn decode_dwwssn_as_int16() -> Result<(), MSeedError> {
        let bytes = [0, 1, 0, 2];
        let ts = decode_primitive(&DataEncoding::DWWSSN, &bytes, 2, ByteOrderTag::Big)?;
        match ts {
            EncodedTimeseries::Int16(v) => assert_eq!(v, vec![1, 2]),
            _ => panic!("wrong variant"),
        }
        Ok(())
    }

    #[test]
    fn zero_samples_is_empty() -> Result<(), MSeedError> {
        let ts = decode_primitive(&DataEncoding::INT32, &[], 0, ByteOrderTag::Little)?;
        assert_eq!(ts.byte_len(), 0);
        Ok(())
    }

    #[test]
    fn short_buffer_is_error() {
        let bytes = [0, 0];
        assert!(decode_primitive(&DataEncoding::INT32, &bytes, 4, ByteOrderTag::Little).is_err());
    }
}
