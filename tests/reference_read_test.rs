//! Exercises `read_mseed3` against a small, hand-built multi-record stream,
//! the way the removed external FDSN reference-data fixtures once did
//! before being distilled down to something this repo can ship standalone.

use chrono::{DateTime, Utc};
use mseed3::{
    DataEncoding, EncodedTimeseries, ExtraHeaders, FdsnSourceIdentifier, MSeed3Header,
    MSeed3Record, MSeedError,
};
use std::io::{BufReader, BufWriter, Cursor};

fn make_record(identifier: &str, start: DateTime<Utc>, samples: Vec<i32>) -> MSeed3Record {
    let header = MSeed3Header::new(start, DataEncoding::INT32, 1.0, samples.len());
    MSeed3Record::new(
        header,
        String::from(identifier),
        ExtraHeaders::new(),
        EncodedTimeseries::Int32(samples),
    )
}

#[test]
fn reads_back_to_back_records() -> Result<(), MSeedError> {
    let t0 = "2021-06-01T00:00:00Z".parse::<DateTime<Utc>>()?;
    let ids = [
        "FDSN:XX_AAAA_00_H_H_Z",
        "FDSN:XX_BBBB_00_H_H_Z",
        "FDSN:XX_CCCC_00_H_H_Z",
    ];
    let mut out = Vec::new();
    {
        let mut buf_writer = BufWriter::new(&mut out);
        for (i, id) in ids.iter().enumerate() {
            let mut rec = make_record(id, t0, vec![i as i32, -(i as i32)]);
            rec.write_to(&mut buf_writer)?;
        }
    }

    let mut reader = BufReader::new(Cursor::new(out));
    let records = mseed3::read_mseed3(&mut reader)?;
    assert_eq!(records.len(), 3);
    for (rec, id) in records.iter().zip(ids.iter()) {
        assert_eq!(&rec.identifier, id);
        assert_eq!(rec.header.num_samples, 2);
    }
    Ok(())
}

#[test]
fn identifier_parse_abbreviated_forms() -> Result<(), MSeedError> {
    let network = FdsnSourceIdentifier::parse("FDSN:CO")?;
    assert!(network.station.is_empty());

    let station = FdsnSourceIdentifier::parse("FDSN:CO_JSC")?;
    assert_eq!(station.station, "JSC");
    assert!(station.location.is_empty());

    let location = FdsnSourceIdentifier::parse("FDSN:CO_JSC_00")?;
    assert_eq!(location.location, "00");
    assert!(location.band.is_empty());

    let channel = FdsnSourceIdentifier::parse("FDSN:CO_JSC_00_L_H_Z")?;
    assert_eq!(channel.band, "L");
    assert_eq!(channel.source, "H");
    assert_eq!(channel.subsource, "Z");
    Ok(())
}
