//! Merges adjacent, time-contiguous miniSEED3 records for the same
//! channel. Only records sharing identifier, sample rate, encoding and
//! publication version, with `a` ending just before `b` starts, are
//! merged; everything else is returned unchanged.

use crate::data_encoding::DataEncoding;
use crate::encoded_timeseries::EncodedTimeseries;
use crate::extra_headers::ExtraHeaders;
use crate::record::MSeed3Record;

/// Default fraction of a sample period allowed as a gap between two
/// records before they are considered discontiguous.
pub const DEFAULT_TIME_TOL_FACTOR: f64 = 0.5;

/// True if `a` immediately precedes `b` on the same channel: same
/// identifier, sample rate, encoding and publication version, `a`'s end
/// time before `b`'s start time, and the gap between them smaller than
/// `time_tol_factor` times a's sample period.
pub fn are_compatible(a: &MSeed3Record, b: &MSeed3Record, time_tol_factor: f64) -> bool {
    if a.identifier != b.identifier {
        return false;
    }
    if a.header.sample_rate_period != b.header.sample_rate_period {
        return false;
    }
    if a.header.encoding != b.header.encoding {
        return false;
    }
    if a.header.publication_version != b.header.publication_version {
        return false;
    }
    let (a_end, b_start) = match (a.header.get_end_as_utc(), b.header.get_start_as_utc()) {
        (Ok(a_end), Ok(b_start)) => (a_end, b_start),
        _ => return false,
    };
    if a_end >= b_start {
        return false;
    }
    let predicted_next_start = a_end + chrono::Duration::nanoseconds(
        (a.header.sample_period() * 1_000_000_000.0).round() as i64,
    );
    let gap_seconds = (b_start - predicted_next_start).num_nanoseconds().unwrap_or(i64::MAX) as f64
        / 1_000_000_000.0;
    gap_seconds < a.header.sample_period() * time_tol_factor
}

/// True for the primitive encodings (16/32-bit int, 32/64-bit float)
/// eligible for merging. Text (0) and Steim (10/11/19) payloads must be
/// decompressed to a primitive encoding first; opaque and unknown
/// encodings are never mergeable.
fn is_mergeable_encoding(encoding: &DataEncoding) -> bool {
    matches!(
        encoding,
        DataEncoding::INT16 | DataEncoding::INT32 | DataEncoding::FLOAT32 | DataEncoding::FLOAT64
    )
}

/// Attempts to merge two adjacent records. Returns a single merged record
/// when compatible, both originals unchanged otherwise. `None` inputs pass
/// through per the reference's null-propagation rules: merging `None` with
/// a record returns that record; merging two `None`s returns `None`.
///
/// Extra headers are taken from `a`; `b`'s are discarded, since merging
/// two opaque JSON trees has no well-defined general meaning.
pub fn merge(
    a: Option<MSeed3Record>,
    b: Option<MSeed3Record>,
    time_tol_factor: f64,
) -> Vec<Option<MSeed3Record>> {
    match (a, b) {
        (None, None) => vec![None],
        (None, Some(b)) => vec![Some(b)],
        (Some(a), None) => vec![Some(a)],
        (Some(a), Some(b)) => {
            if !is_mergeable_encoding(&a.header.encoding) {
                return vec![Some(a), Some(b)];
            }
            if !are_compatible(&a, &b, time_tol_factor) {
                return vec![Some(a), Some(b)];
            }
            let mut merged_header = a.header.clone();
            merged_header.num_samples = a.header.num_samples + b.header.num_samples;

            let merged_data = match (a.encoded_data, b.encoded_data) {
                (EncodedTimeseries::Int16(mut av), EncodedTimeseries::Int16(bv)) => {
                    av.extend(bv);
                    EncodedTimeseries::Int16(av)
                }
                (EncodedTimeseries::Int32(mut av), EncodedTimeseries::Int32(bv)) => {
                    av.extend(bv);
                    EncodedTimeseries::Int32(av)
                }
                (EncodedTimeseries::Float32(mut av), EncodedTimeseries::Float32(bv)) => {
                    av.extend(bv);
                    EncodedTimeseries::Float32(av)
                }
                (EncodedTimeseries::Float64(mut av), EncodedTimeseries::Float64(bv)) => {
                    av.extend(bv);
                    EncodedTimeseries::Float64(av)
                }
                (av, _) => av, // unreachable given the is_mergeable_encoding / same-encoding checks above
            };

            let merged = MSeed3Record::new(
                merged_header,
                a.identifier,
                a.extra_headers,
                merged_data,
            );
            vec![Some(merged)]
        }
    }
}
