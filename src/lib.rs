//! FastLZ-style LZ77 compression for Solady's `LibZip.flzDecompress`.
//!
//! The compressor emits exactly the command stream the on-chain decompressor
//! reads: literal runs of up to 32 bytes and back-references reaching at most
//! 8192 bytes back. Output is a pure function of the input.
//!
//! ```
//! let data = b"abcabcabcabcabcabcabcabcabcabcabc";
//! let packed = flz::compress(data);
//! assert_eq!(flz::decompress_to_vec(&packed, None).unwrap(), data);
//! ```
#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

mod compress;
mod decompress;
mod format;
mod util;

#[cfg(feature = "alloc")]
pub use compress::compress;
pub use compress::{CompressError, CompressState};
#[cfg(feature = "alloc")]
pub use decompress::decompress_to_vec;
pub use decompress::{decompress_to_buf, DecompressError};
pub use format::{
    max_compressed_len, Command, Commands, MAX_DISTANCE, MAX_LITERAL_RUN, MAX_MATCH_LEN,
    MIN_MATCH_LEN,
};
