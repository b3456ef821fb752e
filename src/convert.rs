//! Converts a parsed miniSEED2 record into a miniSEED3 record, mapping
//! header fields, flags and a handful of extra header values. Unknown v2
//! blockettes are dropped (see module docs in DESIGN.md).

use serde_json::{json, Value};

use crate::data_encoding::DataEncoding;
use crate::encoded_timeseries::EncodedTimeseries;
use crate::extra_headers::ExtraHeaders;
use crate::fdsn_source_identifier::FdsnSourceIdentifier;
use crate::header::MSeed3Header;
use crate::miniseed2::{Blockette, MSeed2Record};
use crate::mseed_error::MSeedError;
use crate::record::MSeed3Record;

/// Marker publication version for records whose true version is unknown,
/// as is always the case immediately after a v2 -> v3 conversion.
pub const UNKNOWN_DATA_VERSION: u8 = 0;

/// Converts a parsed miniSEED2 record to miniSEED3. Payload bytes are
/// carried over verbatim (Steim frames are never rewritten); only
/// primitive int16/int32 payloads are byte-swapped to little endian if
/// the source record was big endian, since miniSEED3 primitives are
/// always little endian.
pub fn mseed2to3(ms2: &MSeed2Record) -> Result<MSeed3Record, MSeedError> {
    let h2 = &ms2.header;

    let b1000 = ms2
        .blockettes
        .iter()
        .find(|b| matches!(b, Blockette::B1000 { .. }))
        .ok_or(MSeedError::MissingBlockette1000)?;
    let encoding = if let Blockette::B1000 { encoding, .. } = b1000 {
        DataEncoding::from_int(*encoding)
    } else {
        unreachable!()
    };

    let mut year = h2.start_btime.year as i32;
    let mut day_of_year = h2.start_btime.day_of_year as i32;
    let mut hour = h2.start_btime.hour as i32;
    let mut minute = h2.start_btime.minute as i32;
    let mut second = h2.start_btime.second as i32;
    let mut nanosecond: i64 = h2.start_btime.tenth_milli as i64 * 100_000;

    let mut fdsn_extras = serde_json::Map::new();
    if h2.data_quality != b'D' {
        fdsn_extras.insert(
            String::from("DataQuality"),
            json!((h2.data_quality as char).to_string()),
        );
    }

    let mut sample_rate_period = if h2.sample_rate() >= 1.0 {
        h2.sample_rate()
    } else if h2.sample_rate() == 0.0 {
        0.0
    } else {
        -1.0 / h2.sample_rate()
    };

    for b in &ms2.blockettes {
        match b {
            Blockette::B100 { sample_rate, .. } => {
                sample_rate_period = *sample_rate as f64;
            }
            Blockette::B1001 {
                time_quality,
                microseconds,
                ..
            } => {
                // applied whenever B1001 is present, regardless of time_quality
                nanosecond += 1000 * (*microseconds as i64);
                if *time_quality != 0 {
                    let time_obj = fdsn_extras
                        .entry("Time")
                        .or_insert_with(|| json!({}));
                    time_obj["Quality"] = json!(time_quality);
                }
            }
            _ => {}
        }
    }

    if h2.start_btime.second == 60 {
        let time_obj = fdsn_extras.entry("Time").or_insert_with(|| json!({}));
        time_obj["LeapSecond"] = json!(1);
    }

    normalize_carry(
        &mut year,
        &mut day_of_year,
        &mut hour,
        &mut minute,
        &mut second,
        &mut nanosecond,
    );

    let act_bit = (h2.act_flag & 0x01) != 0;
    let io_bit = (h2.io_flag & 0x40) != 0;
    let qual_bit = (h2.qual_flag & 0x10) != 0;
    let flags = (act_bit as u8) << 1 | (io_bit as u8) << 2 | (qual_bit as u8) << 3;

    // placeholder start time, all fields below are overwritten from the v2 btime
    let epoch = chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();
    let mut header = MSeed3Header::new(epoch, encoding, sample_rate_period, h2.num_samples as usize);
    header.flags = flags;
    header.year = year as u16;
    header.day_of_year = day_of_year as u16;
    header.hour = hour as u8;
    header.minute = minute as u8;
    header.second = second as u8;
    header.nanosecond = nanosecond as u32;
    header.num_samples = h2.num_samples as u32;
    header.publication_version = UNKNOWN_DATA_VERSION;

    let identifier =
        FdsnSourceIdentifier::from_nslc(&h2.network, &h2.station, &h2.location, &h2.channel)?
            .to_string();

    let extra_headers = if fdsn_extras.is_empty() {
        ExtraHeaders::new()
    } else {
        let mut outer = serde_json::Map::new();
        outer.insert(String::from("FDSN"), Value::Object(fdsn_extras));
        ExtraHeaders::from_value(Value::Object(outer))?
    };

    let encoded_data = EncodedTimeseries::Raw(ms2.encoded_data.clone());

    Ok(MSeed3Record::new(
        header,
        identifier,
        extra_headers,
        encoded_data,
    ))
}

/// Normalizes a negative nanosecond carry by borrowing from seconds,
/// minutes, hours, and days in turn. Day-of-year borrow decrements the
/// field (never hard-sets it to a sentinel); a borrow below day 1 rolls
/// back a year using the naive `year % 4 == 0` leap rule, matching the
/// reference converter's approximation (see DESIGN.md for why this is
/// intentionally not corrected to proleptic-Gregorian rules).
fn normalize_carry(
    year: &mut i32,
    day_of_year: &mut i32,
    hour: &mut i32,
    minute: &mut i32,
    second: &mut i32,
    nanosecond: &mut i64,
) {
    if *nanosecond >= 0 {
        return;
    }
    *second -= 1;
    *nanosecond += 1_000_000_000;
    if *second < 0 {
        *second += 60;
        *minute -= 1;
        if *minute < 0 {
            *minute += 60;
            *hour -= 1;
            if *hour < 0 {
                *hour += 24;
                *day_of_year -= 1;
                if *day_of_year < 1 {
                    *year -= 1;
                    let days_in_year = if *year % 4 == 0 { 366 } else { 365 };
                    *day_of_year += days_in_year;
                }
            }
        }
    }
}
