use crate::mseed_error::MSeedError;
use crate::steim_frame_block::{SteimFrame, SteimFrameBlock};
use std::convert::TryFrom;

/**
 * Class for decoding or encoding Steim2-compressed data blocks
 * to or from an array of integer values.
 * <p>
 * Steim compression scheme Copyrighted by Dr. Joseph Steim.<p>
 * <dl>
 * <dt>Reference material found in:</dt>
 * <dd>
 * Appendix B of SEED Reference Manual, 2nd Ed., pp. 119-125
 * <i>Federation of Digital Seismic Networks, et al.</i>
 * February, 1993
 * </dd>
 * </dl>
 *
 * @author Philip Crotwell (U South Carolina)
 * @author Robert Casey (IRIS DMC)
 * @author Doug Neuhauser (UC Berkeley)
 * @author Kevin Frechette (ISTI)
 */

/// Decode the indicated number of samples from the provided Steim2 byte
/// array. `bias` carries over X(-1) from a previous record; 0 means use the
/// embedded X(0) constant as the starting value.
///
/// `check_last_sample`, when true, verifies that the final decoded value
/// matches the X(N) constant embedded in the first frame. Off by default,
/// matching `steim1::decode_with_bias`: a record whose requested sample
/// count is shorter than the frame block's own never satisfies this check.
pub fn decode_with_bias(
    b: &[u8],
    num_samples: u32,
    bias: i32,
    check_last_sample: bool,
) -> Result<Vec<i32>, MSeedError> {
    if b.len() % 64 != 0 {
        return Err(MSeedError::SteimBadLength(b.len()));
    }
    let nsamp = num_samples as usize;
    let mut samples = Vec::with_capacity(nsamp);
    let num_frames = b.len() / 64;
    let mut last_value = bias;
    let mut xn = 0;

    for i in 0..num_frames {
        let temp_samples = extract_samples(b, i * 64)?;
        let mut first_data = 0;
        if i == 0 {
            let start = *temp_samples
                .get(1)
                .ok_or(MSeedError::SteimShortPayload(8, b.len()))?;
            xn = start;
            first_data = 3;
            last_value = bias;
            if bias == 0 {
                let d0 = *temp_samples
                    .get(3)
                    .ok_or(MSeedError::SteimShortPayload(12, b.len()))?;
                last_value = start - d0;
            }
        }
        for &d in temp_samples.iter().skip(first_data) {
            if samples.len() >= nsamp {
                break;
            }
            last_value += d;
            samples.push(last_value);
        }
    }
    if samples.len() != nsamp {
        return Err(MSeedError::SteimCountMismatch(num_samples, samples.len()));
    }
    if check_last_sample && !samples.is_empty() && samples[samples.len() - 1] != xn {
        return Err(MSeedError::Compression(format!(
            "last decoded sample {} does not match embedded X(N) constant {}",
            samples[samples.len() - 1],
            xn
        )));
    }
    Ok(samples)
}

/// Abbreviated, zero-bias version of decode(), with the X(N) integrity
/// check left off.
pub fn decode(b: &[u8], num_samples: u32) -> Result<Vec<i32>, MSeedError> {
    decode_with_bias(b, num_samples, 0, false)
}

/// Encode the array of integer values into a Steim 2 compressed byte frame
/// block. `frames` caps the number of 64-byte frames; `None` means
/// unlimited. `bias` is X(-1) carried over from a previous record, 0 if
/// this is the first record for a channel.
pub fn encode(
    samples: &[i32],
    frames: Option<usize>,
    bias: i32,
) -> Result<SteimFrameBlock, MSeedError> {
    if samples.is_empty() {
        return Err(MSeedError::SteimEmptyInput);
    }
    if frames == Some(0) {
        return Err(MSeedError::SteimZeroFrameCap);
    }
    let mut frame_block = SteimFrameBlock::new(2);
    let mut frame = SteimFrame::new();
    frame.set_word(u32::from_be_bytes(samples[0].to_be_bytes()), 0, 0);
    frame.set_word(
        u32::from_be_bytes(samples[samples.len() - 1].to_be_bytes()),
        0,
        1,
    );
    let mut frame_idx = 2;

    let mut sample_index = 0;
    let mut capped = false;
    while sample_index < samples.len() {
        let mut diff = [0_i32; 7];
        let mut minbits = [0_u32; 7];
        let mut points_remaining = 0;
        for (i, d) in diff.iter_mut().enumerate() {
            if sample_index + i < samples.len() {
                *d = if sample_index + i == 0 {
                    samples[0] - bias
                } else {
                    samples[sample_index + i] - samples[sample_index + i - 1]
                };
                minbits[i] = min_bits_needed(*d);
                points_remaining += 1;
            } else {
                break;
            }
        }

        let nbits = bits_for_pack(&minbits, points_remaining);
        let (ndiff, bitmask, submask, nibble): (usize, u32, u32, u32) = match nbits {
            4 => (7, 0x0000000F, 0x02, 3),
            5 => (6, 0x0000001F, 0x01, 3),
            6 => (5, 0x0000003F, 0x00, 3),
            8 => (4, 0x000000FF, 0, 1),
            10 => (3, 0x000003FF, 0x03, 2),
            15 => (2, 0x00007FFF, 0x02, 2),
            30 => (1, 0x3FFFFFFF, 0x01, 2),
            _ => return Err(MSeedError::SteimValueTooWide(nbits as i64)),
        };

        let word = steim_pack_word(&diff, nbits, ndiff, bitmask, submask);
        frame.set_word(word, nibble, frame_idx);
        frame_idx += 1;
        sample_index += ndiff;

        if frame_idx == 15 {
            frame_block.steim_frame.push(frame);
            if Some(frame_block.steim_frame.len()) == frames {
                frame_block.reverse_integration_constant(samples[sample_index - 1]);
                capped = true;
                break;
            }
            frame = SteimFrame::new();
            frame_idx = 0;
        }
    }
    if !capped && frame_idx > 0 {
        frame_block.steim_frame.push(frame);
    }
    frame_block.num_samples = sample_index;
    if frame_block.steim_frame.is_empty() {
        return Err(MSeedError::Compression(String::from(
            "Steim2 encoding produced no frames",
        )));
    }
    Ok(frame_block)
}

fn min_bits_needed(diff: i32) -> u32 {
    if (-8..8).contains(&diff) {
        4
    } else if (-16..16).contains(&diff) {
        5
    } else if (-32..32).contains(&diff) {
        6
    } else if (-128..128).contains(&diff) {
        8
    } else if (-512..512).contains(&diff) {
        10
    } else if (-16384..16384).contains(&diff) {
        15
    } else if (-536870912..536870912).contains(&diff) {
        30
    } else {
        32
    }
}

fn bits_for_pack(minbits: &[u32; 7], points_remaining: usize) -> u32 {
    if points_remaining >= 7 && minbits[0..7].iter().all(|&b| b <= 4) {
        return 4;
    }
    if points_remaining >= 6 && minbits[0..6].iter().all(|&b| b <= 5) {
        return 5;
    }
    if points_remaining >= 5 && minbits[0..5].iter().all(|&b| b <= 6) {
        return 6;
    }
    if points_remaining >= 4 && minbits[0..4].iter().all(|&b| b <= 8) {
        return 8;
    }
    if points_remaining >= 3 && minbits[0..3].iter().all(|&b| b <= 10) {
        return 10;
    }
    if points_remaining >= 2 && minbits[0] <= 15 && minbits[1] <= 15 {
        return 15;
    }
    if points_remaining >= 1 && minbits[0] <= 30 {
        return 30;
    }
    32
}

fn steim_pack_word(diff: &[i32; 7], nbits: u32, ndiff: usize, bitmask: u32, submask: u32) -> u32 {
    let mut val: u32 = 0;
    for d in diff.iter().take(ndiff) {
        val = (val << nbits) | ((*d as u32) & bitmask);
    }
    if submask != 0 {
        val |= submask << 30;
    }
    val
}

/// Extracts differences (and, for offset 0, the leading X(0)/X(N) header
/// words) from the 64-byte frame of Steim2 data starting at `offset`.
fn extract_samples(bytes: &[u8], offset: usize) -> Result<Vec<i32>, MSeedError> {
    if offset + 4 > bytes.len() {
        return Err(MSeedError::SteimShortPayload(offset + 4, bytes.len()));
    }
    let nibbles = u32::from_be_bytes(<[u8; 4]>::try_from(&bytes[offset..offset + 4]).unwrap());
    let head_nib = (nibbles >> 30) & 0x03;
    if head_nib != 0 {
        return Err(MSeedError::SteimBadNibble(head_nib));
    }
    let mut temp = Vec::with_capacity(32);
    for i in 0..16 {
        let curr_nibble = (nibbles >> (30 - i * 2)) & 0x03;
        let offset_idx = offset + i as usize * 4;
        if offset_idx + 4 > bytes.len() {
            return Err(MSeedError::SteimShortPayload(offset_idx + 4, bytes.len()));
        }
        match curr_nibble {
            0 => {
                if offset == 0 {
                    let v =
                        <[u8; 4]>::try_from(&bytes[offset_idx..offset_idx + 4]).unwrap();
                    temp.push(i32::from_be_bytes(v));
                }
            }
            1 => {
                for n in 0..4 {
                    temp.push((bytes[offset_idx + n] as i8) as i32);
                }
            }
            2 => {
                let temp_int =
                    u32::from_be_bytes(<[u8; 4]>::try_from(&bytes[offset_idx..offset_idx + 4]).unwrap());
                let dnib = (temp_int >> 30) & 0x03;
                let (header_size, diff_count, bit_size) = match dnib {
                    1 => (2, 1, 30),
                    2 => (2, 2, 15),
                    3 => (2, 3, 10),
                    _ => return Err(MSeedError::SteimBadDnib(dnib)),
                };
                temp.extend(extract_dnib_values(temp_int, header_size, diff_count, bit_size));
            }
            3 => {
                let temp_int =
                    u32::from_be_bytes(<[u8; 4]>::try_from(&bytes[offset_idx..offset_idx + 4]).unwrap());
                let dnib = (temp_int >> 30) & 0x03;
                let (header_size, diff_count, bit_size) = match dnib {
                    0 => (2, 5, 6),
                    1 => (2, 6, 5),
                    2 => (4, 7, 4),
                    _ => return Err(MSeedError::SteimBadDnib(dnib)),
                };
                temp.extend(extract_dnib_values(temp_int, header_size, diff_count, bit_size));
            }
            _ => return Err(MSeedError::SteimBadNibble(curr_nibble)),
        }
    }
    Ok(temp)
}

fn extract_dnib_values(temp_int: u32, header_size: u32, diff_count: u32, bit_size: u32) -> Vec<i32> {
    let mut out = Vec::with_capacity(diff_count as usize);
    for d in 0..diff_count {
        let shifted = temp_int.wrapping_shl(header_size + d * bit_size);
        let val = (shifted as i32) >> ((diff_count - 1) * bit_size + header_size);
        out.push(val);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_bits() {
        assert_eq!(min_bits_needed(0), 4);
        assert_eq!(min_bits_needed(7), 4);
        assert_eq!(min_bits_needed(8), 5);
        assert_eq!(min_bits_needed(-536870912), 30);
        assert_eq!(min_bits_needed(536870912), 32);
    }

    #[test]
    fn round_trip_small_diffs() -> Result<(), MSeedError> {
        let mut samples = Vec::new();
        let mut v = 1000_i32;
        for i in 0..400 {
            v += ((i % 7) as i32) - 3;
            samples.push(v);
        }
        let frame_block = encode(&samples, None, 0)?;
        assert_eq!(frame_block.num_samples, samples.len());
        let enc = frame_block.get_encoded_data()?;
        let rt = decode(&enc, samples.len() as u32)?;
        assert_eq!(rt, samples);
        Ok(())
    }

    #[test]
    fn round_trip_mixed_magnitude_diffs() -> Result<(), MSeedError> {
        let samples = vec![1, 2, 4, 8, 16, 1000, -1000, 100000, -100000, 5, 6, 7];
        let frame_block = encode(&samples, None, 0)?;
        let enc = frame_block.get_encoded_data()?;
        let rt = decode(&enc, samples.len() as u32)?;
        assert_eq!(rt, samples);
        Ok(())
    }

    #[test]
    fn empty_input_is_error() {
        let data: [i32; 0] = [];
        assert!(encode(&data, None, 0).is_err());
    }

    #[test]
    fn sinusoid_round_trips_in_capped_blocks() -> Result<(), MSeedError> {
        let data: Vec<i32> = (0..100_000)
            .map(|i| (499.0 * (i as f64).sin()) as i32)
            .collect();
        let mut index = 0;
        let mut bias = 0;
        while index < data.len() {
            let block = encode(&data[index..], Some(63), bias)?;
            assert!(block.num_samples <= 4305);
            let enc = block.get_encoded_data()?;
            let rt = decode_with_bias(&enc, block.num_samples as u32, bias, false)?;
            assert_eq!(rt, data[index..index + block.num_samples]);
            bias = *rt.last().unwrap();
            index += block.num_samples;
        }
        Ok(())
    }
}
