//! Elias-Gamma coded sequences.
//!
//! Wire format: `[gamma(count)] [gamma(delta_1)] [gamma(delta_2)] …`
//! packed most-significant-bit-first. Each delta is taken against the
//! previously reconstructed value (starting at zero), so a strictly
//! increasing sequence encodes as a stream of positive integers. An
//! empty sequence is a single zero byte; a gamma code always contains a
//! one bit, so the sentinel cannot collide with a real count prefix.

use std::borrow::Cow;

use crate::error::{CrocusError, Result};
use crate::sequence::bits::{BitReader, BitWriter};
use crate::sequence::{CodedSequence, RawBytes};

/// An immutable view over an Elias-Gamma coded sequence.
#[derive(Debug, Clone)]
pub struct GammaCodedSequence<'a> {
    raw: RawBytes<'a>,
}

impl GammaCodedSequence<'static> {
    /// Encode a strictly increasing sequence of positive integers.
    ///
    /// Returns an error if the values are not strictly increasing or the
    /// first value is not positive; a malformed buffer is never produced.
    pub fn generate(values: &[i32]) -> Result<Self> {
        let mut writer = BitWriter::new();

        if values.is_empty() {
            writer.put(0, 8);
        } else {
            writer.put_gamma(values.len() as u32);

            let mut prev = 0i32;
            for &value in values {
                let delta = value - prev;
                if delta <= 0 {
                    return Err(CrocusError::invalid_argument(format!(
                        "values must be strictly increasing and positive, got {value} after {prev}"
                    )));
                }
                writer.put_gamma(delta as u32);
                prev = value;
            }
        }

        Ok(GammaCodedSequence {
            raw: Cow::Owned(writer.finish()),
        })
    }
}

impl<'a> GammaCodedSequence<'a> {
    /// View an existing encoded buffer without copying it.
    pub fn from_bytes(raw: &'a [u8]) -> Self {
        GammaCodedSequence {
            raw: Cow::Borrowed(raw),
        }
    }

    /// Convert into a sequence that owns its bytes.
    pub fn into_owned(self) -> GammaCodedSequence<'static> {
        GammaCodedSequence {
            raw: Cow::Owned(self.raw.into_owned()),
        }
    }
}

/// Decode only the leading count field of an encoded buffer.
pub fn read_count(raw: &[u8]) -> usize {
    if raw.is_empty() || (raw.len() == 1 && raw[0] == 0) {
        return 0;
    }
    BitReader::new(raw).get_gamma() as usize
}

impl CodedSequence for GammaCodedSequence<'_> {
    type Iter<'s>
        = GammaSequenceIter<'s>
    where
        Self: 's;

    fn iter(&self) -> GammaSequenceIter<'_> {
        GammaSequenceIter::new(&self.raw, 0)
    }

    fn offset_iter(&self, offset: i32) -> GammaSequenceIter<'_> {
        GammaSequenceIter::new(&self.raw, offset)
    }

    fn value_count(&self) -> usize {
        read_count(&self.raw)
    }

    fn buffer_size(&self) -> usize {
        self.raw.len()
    }

    fn bytes(&self) -> &[u8] {
        &self.raw
    }
}

impl PartialEq for GammaCodedSequence<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for GammaCodedSequence<'_> {}

/// Lazy decoder over a gamma coded buffer.
///
/// Holds its own cursor, so multiple iterators over the same sequence
/// never interfere.
pub struct GammaSequenceIter<'a> {
    reader: BitReader<'a>,
    remaining: usize,
    prev: i32,
}

impl<'a> GammaSequenceIter<'a> {
    fn new(raw: &'a [u8], offset: i32) -> Self {
        let remaining = read_count(raw);
        let mut reader = BitReader::new(raw);
        if remaining > 0 {
            // Skip the count prefix.
            reader.get_gamma();
        }
        GammaSequenceIter {
            reader,
            remaining,
            prev: offset,
        }
    }
}

impl Iterator for GammaSequenceIter<'_> {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.prev += self.reader.get_gamma() as i32;
        Some(self.prev)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
