use crate::mseed_error::MSeedError;
use crate::steim_frame_block::{SteimFrame, SteimFrameBlock};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::convert::TryFrom;

/**
 * Class for decoding or encoding Steim1-compressed data blocks
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
 * <dt>Coding concepts gleaned from code written by:</dt>
 * <dd>Guy Stewart, IRIS, 1991</dd>
 * <dd>Tom McSweeney, IRIS, 2000</dd>
 * </dl>
 *
 * @author Philip Crotwell (U South Carolina)
 * @author Robert Casey (IRIS DMC)
 * @version 10/22/2002
 */

/// Decode the indicated number of samples from the provided byte array and
/// return an integer array of the decompressed values. Being differencing
/// compression, there may be an offset carried over from a previous data
/// record. This offset value can be placed in `bias`, otherwise leave it 0.
///
/// If `bias` is 0, the starting value is taken from the X(0) constant
/// embedded in the first frame, matching the behavior of the reference
/// Steim1 decoder when no prior record is available.
///
/// `check_last_sample`, when true, verifies that the final decoded value
/// matches the X(N) constant embedded in the first frame. Off by default:
/// a record truncated to fewer samples than it originally held (common
/// when only part of a channel is requested) will never satisfy this
/// check even though its data is otherwise valid.
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
    let mut x0 = 0;
    let mut xn = 0;
    let mut last_value = bias;

    for i in 0..num_frames {
        // returns only differences except for frame 0, which carries X(0) and X(N)
        let temp_samples = extract_samples(b, i * 64)?;
        let mut ts_itr = temp_samples.iter();
        if i == 0 {
            x0 = *ts_itr
                .next()
                .ok_or(MSeedError::SteimShortPayload(0, b.len()))?;
            xn = *ts_itr
                .next()
                .ok_or(MSeedError::SteimShortPayload(4, b.len()))?;
            if bias == 0 {
                // no carried-over value, so reconstruction starts from X(0)
                last_value = x0;
            }
            samples.push(last_value);
        }
        for s in ts_itr {
            last_value += s;
            samples.push(last_value)
        }
    }
    if samples.len() != nsamp {
        return Err(MSeedError::SteimCountMismatch(num_samples, samples.len()));
    }
    if bias == 0 && samples[0] != x0 {
        return Err(MSeedError::Compression(format!(
            "first decoded sample {} does not match embedded X(0) constant {}",
            samples[0], x0
        )));
    }
    if check_last_sample && samples[samples.len() - 1] != xn {
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

/// Encode the array of integer values into a Steim 1 compressed byte frame
/// block. `frames` caps the number of 64-byte frames written; `None` means
/// unlimited (bounded only by the number of samples). If `samples` is
/// exhausted before all frames are filled, the remaining frames are simply
/// not allocated.
pub fn encode(samples: &[i32], frames: Option<usize>) -> Result<SteimFrameBlock, MSeedError> {
    if samples.is_empty() {
        return Err(MSeedError::SteimEmptyInput);
    }
    if frames == Some(0) {
        return Err(MSeedError::SteimZeroFrameCap);
    }
    let mut frame_block = SteimFrameBlock::new(1);

    let diff_iter = samples.iter().scan(0, |state, &x| {
        let d = x - *state;
        *state = x;
        Some(d)
    });

    let mut num_samples = 0;
    let mut by_four = ByFours::new(diff_iter);
    let mut first_sample = true;

    'outer: loop {
        let mut frame = SteimFrame::new();
        let mut frame_idx = 0;
        while let Some(chunk) = by_four.next() {
            if first_sample {
                match chunk {
                    Steim1Word::One(v) => {
                        frame.set_word(u32::from_be_bytes(v.to_be_bytes()), 0, 0)
                    }
                    _ => {
                        return Err(MSeedError::Compression(String::from(
                            "first sample must encode as a single 4-byte value",
                        )))
                    }
                }
                first_sample = false;
                frame_idx += 2; // skip past the slot reserved for X(N)
            } else {
                frame_idx = chunk.add_to_frame(&mut frame, frame_idx);
            }
            num_samples += chunk.num_samples();
            if frame_idx == 15 {
                if Some(frame_block.steim_frame.len() + 1) == frames {
                    frame_block.steim_frame.push(frame);
                    break 'outer;
                }
                break;
            }
        }
        if frame_idx > 0 {
            frame_block.steim_frame.push(frame);
        } else {
            break;
        }
        if by_four.is_exhausted() {
            break;
        }
    }
    frame_block.num_samples = num_samples;
    if frame_block.steim_frame.is_empty() {
        return Err(MSeedError::Compression(String::from(
            "Steim1 encoding produced no frames",
        )));
    }
    frame_block.reverse_integration_constant(samples[num_samples - 1]);
    Ok(frame_block)
}

/// Extracts differences from the next 64 byte frame of the given compressed
/// byte array (starting at offset) and returns those differences in an int
/// array. An offset of 0 means that we are at the first frame, so include the
/// header words X(0) and X(N) in the returned array; else do not.
fn extract_samples(bytes: &[u8], offset: usize) -> Result<Vec<i32>, MSeedError> {
    if offset + 4 > bytes.len() {
        return Err(MSeedError::SteimShortPayload(offset + 4, bytes.len()));
    }
    let nibbles = <[u8; 4]>::try_from(&bytes[offset..offset + 4]).unwrap();
    let nibbles = u32::from_be_bytes(nibbles);
    let mut temp = Vec::new(); // 4 samples * 16 longwords, can't be more
    for i in 1..16 {
        let curr_nibble = (nibbles >> (30 - i * 2)) & 0x03;
        let offset_idx = offset + 4 * i;
        if offset_idx + 4 > bytes.len() {
            return Err(MSeedError::SteimShortPayload(offset_idx + 4, bytes.len()));
        }
        match curr_nibble {
            0 => {
                // headers can only occur in the second and third 4-byte chunk
                // of the very first frame: X(0) and X(N)
                if offset == 0 && (i == 1 || i == 2) {
                    let v = <[u8; 4]>::try_from(&bytes[offset_idx..offset_idx + 4]).unwrap();
                    temp.push(i32::from_be_bytes(v));
                }
            }
            1 => {
                for n in 0..4 {
                    temp.push((bytes[offset_idx + n] as i8) as i32);
                }
            }
            2 => {
                for n in 0..2 {
                    let v = <[u8; 2]>::try_from(
                        &bytes[(offset_idx + 2 * n)..(offset_idx + 2 + 2 * n)],
                    )
                    .unwrap();
                    temp.push(i16::from_be_bytes(v) as i32);
                }
            }
            3 => {
                let v = <[u8; 4]>::try_from(&bytes[offset_idx..offset_idx + 4]).unwrap();
                temp.push(i32::from_be_bytes(v));
            }
            _ => return Err(MSeedError::SteimBadNibble(curr_nibble)),
        }
    }
    Ok(temp)
}

struct ByFours<I>
where
    I: Iterator<Item = i32>,
{
    diff_iter: I,
    prev: VecDeque<i32>,
    first: bool,
    done: bool,
}
impl<I> ByFours<I>
where
    I: Iterator<Item = i32>,
{
    pub fn new(diff_iter: I) -> ByFours<I> {
        ByFours::<I> {
            diff_iter,
            prev: VecDeque::new(),
            first: true,
            done: false,
        }
    }
    pub fn is_exhausted(&self) -> bool {
        self.done
    }
}
impl<Iter> Iterator for ByFours<Iter>
where
    Iter: Iterator<Item = i32>,
{
    type Item = Steim1Word;

    fn next(&mut self) -> Option<Self::Item> {
        if self.first {
            self.first = false;
            // first is always single 4-byte value
            return match self.diff_iter.next() {
                Some(v) => Some(Steim1Word::One(v)),
                None => {
                    self.done = true;
                    None
                }
            };
        }
        while self.prev.len() < 4 {
            match self.diff_iter.next() {
                Some(v) => self.prev.push_back(v),
                None => {
                    if !self.prev.is_empty() {
                        break;
                    } else {
                        self.done = true;
                        return None;
                    }
                }
            }
        }
        if self.prev.len() == 4
            && ok_i8(self.prev[0])
            && ok_i8(self.prev[1])
            && ok_i8(self.prev[2])
            && ok_i8(self.prev[3])
        {
            return Some(Steim1Word::Four(
                self.prev.pop_front().unwrap() as i8,
                self.prev.pop_front().unwrap() as i8,
                self.prev.pop_front().unwrap() as i8,
                self.prev.pop_front().unwrap() as i8,
            ));
        } else if self.prev.len() == 3
            && ok_i8(self.prev[0])
            && ok_i8(self.prev[1])
            && ok_i8(self.prev[2])
        {
            // this case should only happen at end, padded with 0 to encode 4 bytes
            return Some(Steim1Word::Three(
                self.prev.pop_front().unwrap() as i8,
                self.prev.pop_front().unwrap() as i8,
                self.prev.pop_front().unwrap() as i8,
            ));
        } else if self.prev.len() > 1 && ok_i16(self.prev[0]) && ok_i16(self.prev[1]) {
            return Some(Steim1Word::Two(
                self.prev.pop_front().unwrap() as i16,
                self.prev.pop_front().unwrap() as i16,
            ));
        } else if !self.prev.is_empty() {
            return Some(Steim1Word::One(self.prev.pop_front().unwrap()));
        }
        self.done = true;
        None
    }
}

pub fn ok_i8(v: i32) -> bool {
    (-128..=127).contains(&v)
}
pub fn ok_i16(v: i32) -> bool {
    (-32768..=32767).contains(&v)
}

#[derive(Serialize, Deserialize, Debug, Clone)]
enum Steim1Word {
    Four(i8, i8, i8, i8),
    Three(i8, i8, i8),
    Two(i16, i16),
    One(i32),
}

impl Steim1Word {
    pub fn add_to_frame(&self, frame: &mut SteimFrame, frame_idx: usize) -> usize {
        let word = match self {
            Steim1Word::Four(a, b, c, d) => u32::from_be_bytes([
                a.to_be_bytes()[0],
                b.to_be_bytes()[0],
                c.to_be_bytes()[0],
                d.to_be_bytes()[0],
            ]),
            Steim1Word::Three(a, b, c) => {
                u32::from_be_bytes([a.to_be_bytes()[0], b.to_be_bytes()[0], c.to_be_bytes()[0], 0])
            }
            Steim1Word::Two(a, b) => {
                let a = a.to_be_bytes();
                let b = b.to_be_bytes();
                u32::from_be_bytes([a[0], a[1], b[0], b[1]])
            }
            Steim1Word::One(a) => u32::from_be_bytes(a.to_be_bytes()),
        };
        let nibble = match self {
            Steim1Word::Four(..) => 1_u32,
            Steim1Word::Three(..) => 1_u32,
            Steim1Word::Two(..) => 2_u32,
            Steim1Word::One(..) => 3_u32,
        };
        frame.set_word(word, nibble, frame_idx);
        frame_idx + 1
    }
    pub fn num_samples(&self) -> usize {
        match self {
            Steim1Word::Four(..) => 4,
            Steim1Word::Three(..) => 3,
            Steim1Word::Two(..) => 2,
            Steim1Word::One(..) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_iter() {
        let data = [1, -1, -1, -1, 20, -300, 160, -18000];
        let mut diff_iter = data.iter().scan(0, |state, &x| {
            let d = x - *state;
            *state = x;
            Some(d)
        });
        assert_eq!(diff_iter.next().unwrap(), data[0]);
        for i in 1..data.len() {
            assert_eq!(diff_iter.next().unwrap(), data[i] - data[i - 1]);
        }
    }

    #[test]
    fn by_four() -> Result<(), MSeedError> {
        let data = [1, -1, -1, -1, 20, -300, 160, -18000];
        let diff_iter = data.iter().scan(0, |state, &x| {
            let d = x - *state;
            *state = x;
            Some(d)
        });
        let mut found = 0;
        let mut byfour = ByFours::new(diff_iter);

        if let Steim1Word::One(_) = byfour.next().unwrap() {
            found += 1;
            if let Steim1Word::Four(_, _, _, _) = byfour.next().unwrap() {
                found += 4;
                if let Steim1Word::Two(_, _) = byfour.next().unwrap() {
                    found += 2;
                    if let Steim1Word::One(_) = byfour.next().unwrap() {
                        found += 1;
                    }
                }
            }
        }
        assert_eq!(found, data.len());
        Ok(())
    }

    #[test]
    fn data_round_trip() -> Result<(), MSeedError> {
        let data = [1, -1, -1, -1, 200, -300, 16000, -18000, 20000, -40000];
        let frame_block = encode(&data, None)?;
        assert_eq!(data.len(), frame_block.num_samples);
        assert_ne!(frame_block.steim_frame.len(), 0);
        assert_eq!(
            data[0],
            i32::from_be_bytes(frame_block.steim_frame[0].words[0].to_be_bytes())
        );
        let enc_bytes = &frame_block.get_encoded_data()?;
        assert_eq!(enc_bytes[4], 0);
        assert_eq!(enc_bytes[5], 0);
        assert_eq!(enc_bytes[6], 0);
        assert_eq!(enc_bytes[7], 1);
        let frame_data = extract_samples(&enc_bytes[0..64], 0)?;
        assert_eq!(frame_data[0], 1);
        assert_eq!(frame_data[1], -40000); // last sample
        for i in 2..frame_data.len() {
            assert_eq!(frame_data[i], data[i - 1] - data[i - 2], "i: {} ", i);
        }
        let rt_data = decode(
            &frame_block.get_encoded_data()?,
            frame_block.num_samples as u32,
        )?;
        assert_eq!(rt_data.len(), data.len());
        for (idx, pair) in rt_data.iter().zip(data.iter()).enumerate() {
            assert_eq!(pair.0, pair.1, " index {}", idx);
        }
        Ok(())
    }

    #[test]
    fn empty_input_is_error() {
        let data: [i32; 0] = [];
        assert!(encode(&data, None).is_err());
    }

    #[test]
    fn zero_frame_cap_is_error() {
        let data = [1, 2, 3];
        assert!(matches!(
            encode(&data, Some(0)),
            Err(MSeedError::SteimZeroFrameCap)
        ));
    }

    #[test]
    fn bias_continues_from_prior_record() -> Result<(), MSeedError> {
        let data = [100, 101, 99, 98];
        let frame_block = encode(&data, None)?;
        let enc = frame_block.get_encoded_data()?;
        // decode with the true prior last value rather than trusting the embedded X(0)
        let rt = decode_with_bias(&enc, frame_block.num_samples as u32, 100, false)?;
        assert_eq!(rt, data);
        Ok(())
    }

    #[test]
    fn last_sample_check_opt_in() -> Result<(), MSeedError> {
        let data = [1, -1, -1, -1, 200, -300, 16000, -18000, 20000, -40000];
        let frame_block = encode(&data, None)?;
        let enc = frame_block.get_encoded_data()?;
        assert!(decode_with_bias(&enc, frame_block.num_samples as u32, 0, true).is_ok());
        assert!(decode_with_bias(&enc, frame_block.num_samples as u32, 0, false).is_ok());
        Ok(())
    }

    #[test]
    fn tiny_sequence_round_trips_within_frame_budget() -> Result<(), MSeedError> {
        let mut data: Vec<i32> = vec![1, 2, -10, 45, -999, 4008];
        data.extend(std::iter::repeat(129).take(1000));
        let frame_block = encode(&data, None)?;
        assert!(frame_block.steim_frame.len() <= 17);
        let rt = decode(&frame_block.get_encoded_data()?, frame_block.num_samples as u32)?;
        assert_eq!(rt, data);
        Ok(())
    }
}
