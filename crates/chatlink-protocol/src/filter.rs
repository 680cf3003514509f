//! Filter masks -- which characters of a message the relay has censored.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{self, Wire};
use crate::{ProtocolError, MAX_MESSAGE_BYTES};

/// Replacement for filtered characters.
pub const FILTER_CHAR: char = '#';

/// Bit per character position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterBits {
    words: Vec<u64>,
}

impl FilterBits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_words(words: Vec<u64>) -> Self {
        Self { words }
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn set(&mut self, index: usize) {
        let word = index / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (index % 64);
    }

    pub fn get(&self, index: usize) -> bool {
        self.words
            .get(index / 64)
            .is_some_and(|word| word & (1 << (index % 64)) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|word| *word == 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum FilterMask {
    #[default]
    PassThrough,
    FullyFiltered,
    Partial(FilterBits),
}

impl FilterMask {
    const PASS_THROUGH_TAG: i32 = 0;
    const FULLY_FILTERED_TAG: i32 = 1;
    const PARTIAL_TAG: i32 = 2;

    /// Text as it should be shown, or `None` when nothing may be shown.
    pub fn apply(&self, text: &str) -> Option<String> {
        match self {
            FilterMask::PassThrough => Some(text.to_string()),
            FilterMask::FullyFiltered => None,
            FilterMask::Partial(bits) => Some(
                text.chars()
                    .enumerate()
                    .map(|(i, c)| if bits.get(i) { FILTER_CHAR } else { c })
                    .collect(),
            ),
        }
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self, FilterMask::PassThrough)
    }

    pub fn is_fully_filtered(&self) -> bool {
        matches!(self, FilterMask::FullyFiltered)
    }
}

/// A mask never needs more words than the longest message has characters.
const MAX_FILTER_WORDS: usize = MAX_MESSAGE_BYTES.div_ceil(64);

impl Wire for FilterMask {
    fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        match self {
            FilterMask::PassThrough => codec::put_var_int(dst, Self::PASS_THROUGH_TAG),
            FilterMask::FullyFiltered => codec::put_var_int(dst, Self::FULLY_FILTERED_TAG),
            FilterMask::Partial(bits) => {
                if bits.words.len() > MAX_FILTER_WORDS {
                    return Err(ProtocolError::ListTooLong {
                        len: bits.words.len(),
                        max: MAX_FILTER_WORDS,
                    });
                }
                codec::put_var_int(dst, Self::PARTIAL_TAG);
                codec::put_len(dst, bits.words.len());
                for word in &bits.words {
                    dst.put_u64(*word);
                }
            }
        }
        Ok(())
    }

    fn decode(src: &mut Bytes) -> Result<Self, ProtocolError> {
        match codec::get_var_int(src)? {
            Self::PASS_THROUGH_TAG => Ok(FilterMask::PassThrough),
            Self::FULLY_FILTERED_TAG => Ok(FilterMask::FullyFiltered),
            Self::PARTIAL_TAG => {
                let len = codec::get_len(src)?;
                if len > MAX_FILTER_WORDS {
                    return Err(ProtocolError::ListTooLong {
                        len,
                        max: MAX_FILTER_WORDS,
                    });
                }
                let words = (0..len)
                    .map(|_| codec::get_i64(src).map(|w| w as u64))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(FilterMask::Partial(FilterBits::from_words(words)))
            }
            tag => Err(ProtocolError::UnknownTag {
                what: "filter mask",
                tag,
            }),
        }
    }
}
