//! Single-byte text encoding used for the subscription file.
//!
//! Every byte maps to the code point of the same value (the ISO-8859-1 layout),
//! so ASCII text round-trips unchanged and so does anything the mail client
//! wrote in the upper half of the byte range.

use thiserror::Error;

/// A character that has no single-byte representation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("character {ch:?} at offset {offset} can't be written as a single byte")]
pub struct UnencodableChar {
	pub ch: char,
	pub offset: usize,
}

pub fn decode(bytes: &[u8]) -> String {
	bytes.iter().copied().map(char::from).collect()
}

pub fn encode(text: &str) -> Result<Vec<u8>, UnencodableChar> {
	text.char_indices()
		.map(|(offset, ch)| u8::try_from(ch).map_err(|_| UnencodableChar { ch, offset }))
		.collect()
}
