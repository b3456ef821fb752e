//! End-to-end scenarios exercising the public API: a miniSEED3 round trip,
//! CRC tamper detection, and v2-to-v3 conversion equivalence.

use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, Utc};
use mseed3::{
    mseed2to3, DataEncoding, EncodedTimeseries, ExtraHeaders, FdsnSourceIdentifier, MSeed2Record,
    MSeed3Header, MSeed3Record, MSeedError,
};
use std::io::{BufReader, BufWriter, Cursor};

fn write_record(rec: &mut MSeed3Record) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut buf_writer = BufWriter::new(&mut out);
        rec.write_to(&mut buf_writer).unwrap();
    }
    out
}

#[test]
fn mseed3_round_trip_is_bit_equal() -> Result<(), MSeedError> {
    let start = "2024-01-02T15:13:55.123456Z".parse::<DateTime<Utc>>()?;
    let identifier = FdsnSourceIdentifier::parse("FDSN:XX_FAKE__H_H_Z")?.to_string();
    let header = MSeed3Header::new(start, DataEncoding::INT32, -1.0, 4);
    let samples = vec![3, 1, -1, 2000];
    let mut rec = MSeed3Record::new(
        header,
        identifier.clone(),
        ExtraHeaders::new(),
        EncodedTimeseries::Int32(samples.clone()),
    );
    let bytes = write_record(&mut rec);

    let mut reader = BufReader::new(Cursor::new(bytes));
    let parsed = MSeed3Record::from_reader(&mut reader)?;

    assert_eq!(parsed.identifier, identifier);
    assert_eq!(parsed.header.get_start_as_iso()?, start.format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string());
    assert_eq!(parsed.header.sample_rate_period, -1.0);
    assert_eq!(parsed.header.num_samples, samples.len() as u32);
    assert_eq!(parsed.decompressed_samples(0)?, samples);
    Ok(())
}

#[test]
fn tampered_payload_byte_fails_crc() -> Result<(), MSeedError> {
    let start = "2024-01-02T15:13:55.123456Z".parse::<DateTime<Utc>>()?;
    let identifier = FdsnSourceIdentifier::parse("FDSN:XX_FAKE__H_H_Z")?.to_string();
    let header = MSeed3Header::new(start, DataEncoding::INT32, -1.0, 4);
    let mut rec = MSeed3Record::new(
        header,
        identifier,
        ExtraHeaders::new(),
        EncodedTimeseries::Int32(vec![3, 1, -1, 2000]),
    );
    let mut bytes = write_record(&mut rec);
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;

    let mut reader = BufReader::new(Cursor::new(bytes));
    let result = MSeed3Record::from_reader(&mut reader);
    assert!(matches!(result, Err(MSeedError::CrcInvalid(_, _))));
    Ok(())
}

/// Builds a minimal, little-endian, 512-byte miniSEED2 record carrying
/// 4 int32 samples and a Blockette 1000.
fn build_miniseed2_record(samples: &[i32]) -> Vec<u8> {
    let mut buf = vec![0_u8; 512];
    buf[0..6].copy_from_slice(b"000001");
    buf[6] = b'D';
    buf[8..13].copy_from_slice(b"FAKE ");
    buf[13..15].copy_from_slice(b"00");
    buf[15..18].copy_from_slice(b"HHZ");
    buf[18..20].copy_from_slice(b"XX");
    LittleEndian::write_u16(&mut buf[20..22], 2024);
    LittleEndian::write_u16(&mut buf[22..24], 2);
    buf[24] = 0;
    buf[25] = 0;
    buf[26] = 0;
    LittleEndian::write_u16(&mut buf[30..32], samples.len() as u16);
    LittleEndian::write_i16(&mut buf[32..34], 1);
    LittleEndian::write_i16(&mut buf[34..36], 1);
    buf[39] = 1;
    LittleEndian::write_u16(&mut buf[44..46], 56);
    LittleEndian::write_u16(&mut buf[46..48], 48);
    // Blockette 1000 at offset 48: INT32 encoding, little endian, 512-byte record (exponent 9)
    LittleEndian::write_u16(&mut buf[48..50], 1000);
    LittleEndian::write_u16(&mut buf[50..52], 0);
    buf[52] = 3;
    buf[53] = 0;
    buf[54] = 9;
    for (i, s) in samples.iter().enumerate() {
        LittleEndian::write_i32(&mut buf[56 + i * 4..60 + i * 4], *s);
    }
    buf
}

#[test]
fn v2_to_v3_conversion_preserves_samples() -> Result<(), MSeedError> {
    let samples = vec![10, -5, 20, -15];
    let buf = build_miniseed2_record(&samples);
    let ms2 = MSeed2Record::from_bytes(&buf, 512)?;
    let direct_samples = ms2.decompressed_samples()?;
    assert_eq!(direct_samples, samples);

    let ms3 = mseed2to3(&ms2)?;
    assert_eq!(ms3.identifier, "FDSN:XX_FAKE_00_H_H_Z");
    let converted_samples = ms3.decompressed_samples(0)?;
    assert_eq!(converted_samples, direct_samples);
    Ok(())
}
