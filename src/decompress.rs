use crate::format::{Command, Commands};
use crate::util::*;

#[cfg(feature = "alloc")]
extern crate alloc;

/// Decompression errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DecompressError {
    /// A command needed more bytes than the stream had left
    #[error("input was truncated")]
    InputTruncated,
    /// A backreference reached before the start of the output
    #[error("invalid backreference")]
    InvalidBackreference,
    /// The output buffer filled up; it holds the output up to that point
    #[error("output buffer was insufficient")]
    OutputTooSmall,
}

impl OutputSink<DecompressError> for BufOutput<'_> {
    fn put_lits(&mut self, lits: &[u8]) -> Result<(), DecompressError> {
        if self.put_truncating(lits) {
            Ok(())
        } else {
            Err(DecompressError::OutputTooSmall)
        }
    }

    fn put_backref(&mut self, disp: usize, len: usize) -> Result<(), DecompressError> {
        if disp + 1 > self.pos {
            return Err(DecompressError::InvalidBackreference);
        }

        let n = usize::min(len, self.buf.len() - self.pos);
        let start = self.pos - disp - 1;
        if disp + 1 >= n {
            self.buf.copy_within(start..start + n, self.pos);
        } else {
            // overlapping, the copy reads its own output
            for i in 0..n {
                self.buf[self.pos + i] = self.buf[start + i];
            }
        }
        self.pos += n;

        if n < len {
            Err(DecompressError::OutputTooSmall)
        } else {
            Ok(())
        }
    }
}

#[cfg(feature = "alloc")]
impl OutputSink<DecompressError> for VecOutput {
    fn put_lits(&mut self, lits: &[u8]) -> Result<(), DecompressError> {
        self.vec.extend_from_slice(lits);
        Ok(())
    }

    fn put_backref(&mut self, disp: usize, len: usize) -> Result<(), DecompressError> {
        let pos = self.vec.len();
        if disp + 1 > pos {
            return Err(DecompressError::InvalidBackreference);
        }

        let start = pos - disp - 1;
        if disp + 1 >= len {
            self.vec.extend_from_within(start..start + len);
        } else {
            self.vec.reserve(len);
            for i in 0..len {
                let b = self.vec[start + i];
                self.vec.push(b);
            }
        }

        Ok(())
    }
}

fn decompress_impl(
    inp: &[u8],
    outp: &mut impl OutputSink<DecompressError>,
) -> Result<(), DecompressError> {
    for cmd in Commands::new(inp) {
        match cmd? {
            Command::Literals(lits) => outp.put_lits(lits)?,
            Command::Backref { disp, len } => outp.put_backref(disp, len)?,
        }
    }
    Ok(())
}

/// Decompress the input into a preallocated buffer
///
/// Returns the decompressed size on success. On [DecompressError::OutputTooSmall]
/// the buffer has been filled with as much output as fits.
pub fn decompress_to_buf(inp: &[u8], outp: &mut [u8]) -> Result<usize, DecompressError> {
    let mut outp: BufOutput = outp.into();
    decompress_impl(inp, &mut outp)
        .inspect_err(|err| tracing::debug!(%err, written = outp.pos, "decompression failed"))?;
    tracing::trace!(input_len = inp.len(), output_len = outp.pos, "decompressed");
    Ok(outp.pos)
}

#[cfg(feature = "alloc")]
/// Decompress the input into a [Vec](alloc::vec::Vec)
///
/// `capacity_hint` preallocates the output, typically with the original length.
pub fn decompress_to_vec(
    inp: &[u8],
    capacity_hint: Option<usize>,
) -> Result<alloc::vec::Vec<u8>, DecompressError> {
    let mut ret: VecOutput = if let Some(capacity_hint) = capacity_hint {
        alloc::vec::Vec::with_capacity(capacity_hint)
    } else {
        alloc::vec::Vec::new()
    }
    .into();
    decompress_impl(inp, &mut ret).inspect_err(
        |err| tracing::debug!(%err, written = ret.vec.len(), "decompression failed"),
    )?;
    tracing::trace!(input_len = inp.len(), output_len = ret.vec.len(), "decompressed");
    Ok(ret.vec)
}
