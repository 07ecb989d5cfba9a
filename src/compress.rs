use core::mem;

use crate::format::*;
use crate::util::*;

#[cfg(feature = "alloc")]
extern crate alloc;

/// Matches may not start closer than this to the end of the input
///
/// Keeps every 3 byte read and every match extension inside the input. The
/// last position before this boundary is probed but never used.
const SCAN_TAIL: usize = 14;

/// First position probed for a match
const SCAN_START: usize = 2;

/// Compression errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CompressError {
    /// The output buffer was too small to hold all the output.
    ///
    /// The output that has been written *is* valid, but has been truncated.
    #[error("output buffer was insufficient")]
    OutputTooSmall,
}

trait OutputHelper {
    type Error;
    fn putc(&mut self, c: u8) -> Result<(), Self::Error>;
    fn put_buf(&mut self, buf: &[u8]) -> Result<(), Self::Error>;
}
impl OutputHelper for BufOutput<'_> {
    type Error = CompressError;

    fn putc(&mut self, c: u8) -> Result<(), CompressError> {
        self.put_buf(&[c])
    }
    fn put_buf(&mut self, buf: &[u8]) -> Result<(), CompressError> {
        if self.put_truncating(buf) {
            Ok(())
        } else {
            Err(CompressError::OutputTooSmall)
        }
    }
}

#[cfg(feature = "alloc")]
impl OutputHelper for VecOutput {
    type Error = core::convert::Infallible;

    fn putc(&mut self, c: u8) -> Result<(), Self::Error> {
        self.vec.push(c);
        Ok(())
    }
    fn put_buf(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.vec.extend_from_slice(buf);
        Ok(())
    }
}

/// Frames literal runs and backreferences into commands
struct Encoder<O>(O);

impl<O: OutputHelper> OutputSink<O::Error> for Encoder<O> {
    fn put_lits(&mut self, lits: &[u8]) -> Result<(), O::Error> {
        debug_assert!(!lits.is_empty());

        // 1 byte opcode, up to 32 bytes literals
        for chunk in lits.chunks(MAX_LITERAL_RUN) {
            self.0.putc((chunk.len() - 1) as u8)?;
            self.0.put_buf(chunk)?;
        }

        Ok(())
    }

    fn put_backref(&mut self, disp: usize, mut len: usize) -> Result<(), O::Error> {
        debug_assert!(disp < MAX_DISTANCE);
        debug_assert!(len >= MIN_MATCH_LEN);

        let disp_hi = (disp >> 8) as u8;
        let disp_lo = disp as u8;

        // too long for one command, so split off fixed pieces sharing the displacement
        while len > MAX_MATCH_LEN {
            self.0.put_buf(&[
                0b111_00000 | disp_hi,
                (MATCH_CHUNK_LEN - 9) as u8,
                disp_lo,
            ])?;
            len -= MATCH_CHUNK_LEN;
        }

        if len <= SHORT_MATCH_MAX {
            // 2 bytes opcode
            self.0.put_buf(&[(((len - 2) << 5) as u8) | disp_hi, disp_lo])
        } else {
            // 3 bytes opcode
            self.0.put_buf(&[0b111_00000 | disp_hi, (len - 9) as u8, disp_lo])
        }
    }
}

fn flz_hash(v: u32) -> usize {
    let h = v.wrapping_mul(2654435769);
    let h = h >> (32 - HTAB_LOG2);
    h as usize
}

/// The three bytes at `pos`, little-endian
fn read_u24(inp: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([inp[pos], inp[pos + 1], inp[pos + 2], 0])
}

/// A position whose first three bytes were confirmed to equal an earlier one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate {
    pos: usize,
    ref_pos: usize,
}

/// Holds state for performing compression operations
///
/// The match index is reset at the start of every call, so reusing a state
/// only saves the allocation; output never depends on earlier calls.
pub struct CompressState {
    htab: [usize; HTAB_SZ],
}
impl Default for CompressState {
    fn default() -> Self {
        Self::new()
    }
}
impl CompressState {
    /// Allocate a new compression state
    pub fn new() -> Self {
        Self { htab: [0; HTAB_SZ] }
    }

    /// Probe positions `pos..end` for the first one with a usable earlier occurrence
    ///
    /// Every probed position is recorded in the index. An empty slot reads as
    /// position 0, which is checked by value like any other candidate.
    fn find_match(&mut self, inp: &[u8], mut pos: usize, end: usize) -> Option<Candidate> {
        while pos < end {
            let seq = read_u24(inp, pos);
            let ref_pos = mem::replace(&mut self.htab[flz_hash(seq)], pos);
            debug_assert!(pos > ref_pos);

            if pos - ref_pos < MAX_DISTANCE && read_u24(inp, ref_pos) == seq {
                return Some(Candidate { pos, ref_pos });
            }
            pos += 1;
        }
        None
    }

    fn compress_impl<E>(&mut self, inp: &[u8], outp: &mut impl OutputSink<E>) -> Result<(), E> {
        self.htab.fill(0);

        let scan_end = inp.len().saturating_sub(SCAN_TAIL);
        let mut lits_start_anchor_pos = 0;
        let mut cur_pos = SCAN_START;

        while let Some(Candidate { pos, ref_pos }) = self.find_match(inp, cur_pos, scan_end) {
            // the byte right before the tail is never covered by a match
            let max_extra = inp.len() - pos - 7;
            let extra = inp[pos + 3..pos + 3 + max_extra]
                .iter()
                .zip(&inp[ref_pos + 3..])
                .take_while(|(a, b)| a == b)
                .count();
            let len = MIN_MATCH_LEN + usize::min(extra, max_extra - 1);

            // any accumulated lits?
            let lits = &inp[lits_start_anchor_pos..pos];
            if !lits.is_empty() {
                outp.put_lits(lits)?;
            }

            outp.put_backref(pos - ref_pos - 1, len)?;

            // update hashes at the boundary
            let tail_pos = pos + len - 2;
            self.htab[flz_hash(read_u24(inp, tail_pos))] = tail_pos;
            self.htab[flz_hash(read_u24(inp, tail_pos + 1))] = tail_pos + 1;

            cur_pos = pos + len;
            lits_start_anchor_pos = cur_pos;
        }

        // if there's anything leftover, output it
        let lits = &inp[lits_start_anchor_pos..];
        if !lits.is_empty() {
            outp.put_lits(lits)?;
        }

        Ok(())
    }

    /// Compress the input into a preallocated buffer
    ///
    /// Returns the compressed size on success, or an error otherwise.
    /// A buffer of [max_compressed_len] bytes is always large enough.
    pub fn compress_to_buf(&mut self, inp: &[u8], outp: &mut [u8]) -> Result<usize, CompressError> {
        let mut outp: Encoder<BufOutput> = Encoder(outp.into());
        self.compress_impl(inp, &mut outp)?;
        tracing::trace!(input_len = inp.len(), output_len = outp.0.pos, "compressed");
        Ok(outp.0.pos)
    }

    #[cfg(feature = "alloc")]
    /// Compress the input into a [Vec](alloc::vec::Vec)
    pub fn compress_to_vec(&mut self, inp: &[u8]) -> alloc::vec::Vec<u8> {
        let ret = alloc::vec::Vec::with_capacity(max_compressed_len(inp.len()));
        let mut ret: Encoder<VecOutput> = Encoder(ret.into());
        match self.compress_impl(inp, &mut ret) {
            Ok(()) => {}
            Err(never) => match never {},
        }
        tracing::trace!(input_len = inp.len(), output_len = ret.0.vec.len(), "compressed");
        ret.0.vec
    }
}

#[cfg(feature = "alloc")]
/// Compress `inp` using a freshly allocated match index
pub fn compress(inp: &[u8]) -> alloc::vec::Vec<u8> {
    let mut state = alloc::boxed::Box::new(CompressState::new());
    state.compress_to_vec(inp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_lits(lits: &[u8], out: &mut [u8]) -> Result<usize, CompressError> {
        let mut outbuf: Encoder<BufOutput> = Encoder(out.into());
        outbuf.put_lits(lits)?;
        Ok(outbuf.0.pos)
    }

    fn encode_backref(disp: usize, len: usize, out: &mut [u8]) -> Result<usize, CompressError> {
        let mut outbuf: Encoder<BufOutput> = Encoder(out.into());
        outbuf.put_backref(disp, len)?;
        Ok(outbuf.0.pos)
    }

    #[test]
    fn test_encoding_lit() {
        {
            let mut out = [0u8; 3];
            assert_eq!(encode_lits(&[1, 2], &mut out), Ok(3));
            assert_eq!(out, [0x01, 1, 2]);
        }

        {
            // truncated, but written up to the limit
            let mut out = [0u8; 2];
            encode_lits(&[1, 2], &mut out).expect_err("");
            assert_eq!(out, [0x01, 1]);
        }

        {
            let mut out = [0u8; 0];
            encode_lits(&[0], &mut out).expect_err("");
        }
    }

    #[test]
    fn test_encoding_lit_split() {
        let lits: [u8; 65] = core::array::from_fn(|i| i as u8);

        {
            // exactly one full run
            let mut out = [0u8; 33];
            assert_eq!(encode_lits(&lits[..32], &mut out), Ok(33));
            assert_eq!(out[0], 31);
            assert_eq!(out[1..], lits[..32]);
        }

        {
            let mut out = [0u8; 68];
            assert_eq!(encode_lits(&lits, &mut out), Ok(68));
            assert_eq!(out[0], 31);
            assert_eq!(out[33], 31);
            assert_eq!(out[34..66], lits[32..64]);
            assert_eq!(out[66..], [0x00, 64]);
        }
    }

    #[test]
    fn test_encoding_short() {
        {
            let mut out = [0u8; 2];
            assert_eq!(encode_backref(1, 5, &mut out), Ok(2));
            assert_eq!(out, [0x60, 0x01]);
        }

        {
            let mut out = [0u8; 2];
            assert_eq!(encode_backref(8190, 3, &mut out), Ok(2));
            assert_eq!(out, [0x3f, 0xfe]);
        }

        {
            let mut out = [0u8; 1];
            encode_backref(1, 5, &mut out).expect_err("");
            assert_eq!(out, [0x60]);
        }
    }

    #[test]
    fn test_encoding_long() {
        {
            let mut out = [0u8; 3];
            assert_eq!(encode_backref(1, 9, &mut out), Ok(3));
            assert_eq!(out, [0xe0, 0x00, 0x01]);
        }

        {
            let mut out = [0u8; 3];
            assert_eq!(encode_backref(0x123, 264, &mut out), Ok(3));
            assert_eq!(out, [0xe1, 0xff, 0x23]);
        }

        {
            let mut out = [0u8; 1];
            encode_backref(1, 9, &mut out).expect_err("");
            assert_eq!(out, [0xe0]);
        }
    }

    #[test]
    fn test_encoding_verylong() {
        {
            // exactly overflows len 3 into next
            let mut out = [0u8; 5];
            assert_eq!(encode_backref(1, 265, &mut out), Ok(5));
            assert_eq!(out, [0xe0, 0xfd, 0x01, 0x20, 0x01]);
        }

        {
            // exactly overflows len 264 (max) into next
            let mut out = [0u8; 6];
            assert_eq!(encode_backref(1, 526, &mut out), Ok(6));
            assert_eq!(out, [0xe0, 0xfd, 0x01, 0xe0, 0xff, 0x01]);
        }

        {
            // overflows twice
            let mut out = [0u8; 8];
            assert_eq!(encode_backref(1, 527, &mut out), Ok(8));
            assert_eq!(out, [0xe0, 0xfd, 0x01, 0xe0, 0xfd, 0x01, 0x20, 0x01]);
        }
    }

    #[test]
    fn test_ref_hashes() {
        assert_eq!(flz_hash(1), 5062);
        assert_eq!(flz_hash(2), 1933);
        assert_eq!(flz_hash(3), 6996);
        assert_eq!(flz_hash(4), 3867);
        assert_eq!(flz_hash(0xaa), 538);
        assert_eq!(flz_hash(0xbb), 4688);
        assert_eq!(flz_hash(0xff), 4904);
    }

    #[test]
    fn test_hash_range() {
        for v in [0, 1, 0x7fffff, 0x800000, 0xffffff] {
            assert!(flz_hash(v) < HTAB_SZ);
        }
    }

    #[test]
    fn test_find_match_no_earlier_occurrence() {
        let mut state = CompressState::new();
        let inp = [9u8, 8, 7, 1, 2, 3, 4, 5, 6];
        // nothing at position 0 looks like anything later
        assert_eq!(state.find_match(&inp, 2, 6), None);
        assert_eq!(state.htab[flz_hash(read_u24(&inp, 5))], 5);
    }

    #[test]
    fn test_find_match_rejects_collisions() {
        // 04 01 01 and 59 11 01 share a slot
        assert_eq!(flz_hash(0x010104), 1346);
        assert_eq!(flz_hash(0x011159), 1346);

        let mut state = CompressState::new();
        let inp = [9u8, 9, 0x04, 0x01, 0x01, 0x59, 0x11, 0x01];
        assert_eq!(state.find_match(&inp, 2, 3), None);
        assert_eq!(state.htab[1346], 2);

        // the slot points at position 2, but the bytes there differ
        assert_eq!(state.find_match(&inp, 5, 6), None);
        assert_eq!(state.htab[1346], 5);
    }

    #[test]
    fn test_find_match_against_empty_slot() {
        let mut state = CompressState::new();
        let inp = [1u8, 2, 3, 9, 1, 2, 3];
        assert_eq!(
            state.find_match(&inp, 2, 5),
            Some(Candidate { pos: 4, ref_pos: 0 })
        );
    }

    #[test]
    fn test_short_and_uncompressible() {
        let mut state = CompressState::new();

        {
            let mut out = [0u8; 0];
            let len = state.compress_to_buf(&[], &mut out).unwrap();
            assert_eq!(len, 0);
        }

        {
            let mut out = [0u8; 3];
            let len = state.compress_to_buf(&[1, 2], &mut out).unwrap();
            assert_eq!(len, out.len());
            assert_eq!(out, [0x01, 1, 2]);
        }

        {
            let mut out = [0u8; 6];
            let len = state.compress_to_buf(&[1, 2, 3, 4, 5], &mut out).unwrap();
            assert_eq!(len, out.len());
            assert_eq!(out, [0x04, 1, 2, 3, 4, 5]);
        }
    }

    #[test]
    fn test_no_match_within_tail() {
        // 16 bytes leaves no position far enough from the end to start a match
        let mut state = CompressState::new();
        let mut out = [0u8; 17];
        let len = state.compress_to_buf(&[0x41; 16], &mut out).unwrap();
        assert_eq!(len, 17);
        assert_eq!(out[0], 15);
        assert_eq!(out[1..], [0x41; 16]);
    }

    #[test]
    fn test_first_possible_match() {
        let mut state = CompressState::new();
        let mut out = [0u8; 12];
        let len = state.compress_to_buf(&[0x41; 17], &mut out).unwrap();
        assert_eq!(len, 12);
        assert_eq!(
            out,
            [0x01, 0x41, 0x41, 0xe0, 0x01, 0x01, 0x04, 0x41, 0x41, 0x41, 0x41, 0x41]
        );
    }

    #[test]
    fn test_match_stops_at_mismatch() {
        let mut inp = [0u8; 32];
        inp[..8].copy_from_slice(b"abcdefgh");
        inp[8..16].copy_from_slice(b"abcdefgh");
        inp[16..24].copy_from_slice(b"abcdefgh");
        inp[24..].copy_from_slice(b"abcdefgh");

        let mut state = CompressState::new();
        let mut out = [0u8; 18];
        let len = state.compress_to_buf(&inp, &mut out).unwrap();
        assert_eq!(len, 18);
        assert_eq!(out[..9], [0x07, b'a', b'b', b'c', b'd', b'e', b'f', b'g', b'h']);
        // 19 byte copy from 8 back, then the tail
        assert_eq!(out[9..12], [0xe0, 0x0a, 0x07]);
        assert_eq!(out[12..], [0x04, b'd', b'e', b'f', b'g', b'h']);
    }

    #[test]
    fn test_buf_too_small() {
        let mut state = CompressState::new();
        let mut out = [0u8; 4];
        assert_eq!(
            state.compress_to_buf(&[1, 2, 3, 4, 5], &mut out),
            Err(CompressError::OutputTooSmall)
        );
        assert_eq!(out, [0x04, 1, 2, 3]);
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn test_state_reuse() {
        let mut state = CompressState::new();
        let a = [0x55u8; 100];
        let b: alloc::vec::Vec<u8> = (0..100u8).collect();

        let first = state.compress_to_vec(&b);
        state.compress_to_vec(&a);
        assert_eq!(state.compress_to_vec(&b), first);
        assert_eq!(compress(&b), first);
    }
}
