//! Fingerprint decoding.
//!
//! Two encodings show up in the wild:
//!
//! - **Raw**: comma-separated integers, as printed by `fpcalc -raw`. Older
//!   builds print signed 32-bit values, newer ones unsigned; both are
//!   accepted and reinterpreted as `u32`.
//! - **Compressed**: Chromaprint's URL-safe base64 form, as stored in
//!   `ACOUSTID_FINGERPRINT` tags. After base64 there is a 4-byte header
//!   (algorithm, 24-bit big-endian item count) followed by two bit-packed
//!   streams: 3-bit deltas between set bit positions of each XOR-ed item
//!   (`0` terminates an item, `7` escapes), then 5-bit continuation values
//!   for every escaped delta.

use crate::error::{ErrorKind, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use exn::{OptionExt, ResultExt};

const NORMAL_BITS: u32 = 3;
const EXCEPTION_BITS: u32 = 5;
const ESCAPE: u32 = (1 << NORMAL_BITS) - 1;

/// Decode an encoded fingerprint into its integer sequence.
///
/// ```
/// use shelver_fingerprint::decode;
///
/// assert_eq!(decode("1,2,-1").unwrap(), vec![1, 2, u32::MAX]);
/// assert_eq!(decode("AQAAAoEA").unwrap(), vec![1, 3]);
/// ```
pub fn decode(encoded: &str) -> Result<Vec<u32>> {
    let encoded = encoded.trim();
    if encoded.is_empty() {
        exn::bail!(ErrorKind::Malformed("empty fingerprint".to_string()));
    }
    if encoded.contains(',') || encoded.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
        decode_raw(encoded)
    } else {
        decode_compressed(encoded)
    }
}

fn decode_raw(encoded: &str) -> Result<Vec<u32>> {
    encoded
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| -> Result<u32> {
            let value = s.parse::<i64>().or_raise(|| ErrorKind::Malformed(format!("not an integer: `{s}`")))?;
            match value {
                v if v < i64::from(i32::MIN) || v > i64::from(u32::MAX) => {
                    exn::bail!(ErrorKind::Malformed(format!("out of range: `{s}`")))
                },
                // Reinterpret signed output as the same 32 bits.
                v if v < 0 => Ok(v as i32 as u32),
                v => Ok(v as u32),
            }
        })
        .collect()
}

fn decode_compressed(encoded: &str) -> Result<Vec<u32>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .or_raise(|| ErrorKind::Malformed("invalid base64".to_string()))?;
    if bytes.len() < 4 {
        exn::bail!(ErrorKind::Malformed("truncated header".to_string()));
    }
    let count = usize::from(bytes[1]) << 16 | usize::from(bytes[2]) << 8 | usize::from(bytes[3]);
    let body = &bytes[4..];

    let mut normal = Vec::new();
    let mut reader = BitReader::new(body);
    let mut terminated = 0;
    while terminated < count {
        let value = reader.read(NORMAL_BITS).ok_or_raise(|| ErrorKind::Malformed("truncated bit stream".to_string()))?;
        if value == 0 {
            terminated += 1;
        }
        normal.push(value);
    }

    // The exception stream starts on the next byte boundary.
    let offset = (normal.len() * NORMAL_BITS as usize).div_ceil(8);
    let mut exceptions = BitReader::new(body.get(offset..).unwrap_or_default());
    for value in normal.iter_mut().filter(|v| **v == ESCAPE) {
        *value += exceptions
            .read(EXCEPTION_BITS)
            .ok_or_raise(|| ErrorKind::Malformed("truncated exception stream".to_string()))?;
    }

    let mut items = Vec::with_capacity(count);
    let mut current = 0u32;
    let mut bit = 0u32;
    for delta in normal {
        if delta == 0 {
            items.push(current);
            current = 0;
            bit = 0;
            continue;
        }
        bit += delta;
        if bit > u32::BITS {
            exn::bail!(ErrorKind::Malformed(format!("bit position {bit} out of range")));
        }
        current |= 1 << (bit - 1);
    }
    // Undo the XOR delta against the previous item.
    for i in 1..items.len() {
        items[i] ^= items[i - 1];
    }
    Ok(items)
}

/// Least-significant-bit-first reader over a byte slice.
struct BitReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn read(&mut self, bits: u32) -> Option<u32> {
        let mut value = 0u32;
        for n in 0..bits {
            let byte = self.bytes.get(self.position / 8)?;
            let bit = (byte >> (self.position % 8)) & 1;
            value |= u32::from(bit) << n;
            self.position += 1;
        }
        Some(value)
    }
}
