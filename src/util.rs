#[cfg(feature = "alloc")]
extern crate alloc;

/// Internal abstraction for the things a command stream can produce
///
/// The compressor implements this with an encoder that frames commands,
/// the decompressor with a sink that materializes bytes.
pub trait OutputSink<ErrTy> {
    /// Add the given literal run to the output
    ///
    /// `lits` is never empty.
    fn put_lits(&mut self, lits: &[u8]) -> Result<(), ErrTy>;
    /// Add a backreference to the output
    ///
    /// A `disp` of 0 means the current position minus 1.
    /// Increasing `disp` means further backwards
    ///
    /// Copy `len` bytes, which as usual for LZ77 may exceed `disp`.
    fn put_backref(&mut self, disp: usize, len: usize) -> Result<(), ErrTy>;
}

/// Output into a caller-provided slice
///
/// Writers fill the slice all the way up to its end before reporting overflow.
pub struct BufOutput<'a> {
    pub pos: usize,
    pub buf: &'a mut [u8],
}
impl<'a> From<&'a mut [u8]> for BufOutput<'a> {
    fn from(buf: &'a mut [u8]) -> Self {
        Self { pos: 0, buf }
    }
}
impl BufOutput<'_> {
    /// Copy as much of `bytes` as fits, returning whether all of it did
    pub fn put_truncating(&mut self, bytes: &[u8]) -> bool {
        let room = self.buf.len() - self.pos;
        let n = usize::min(room, bytes.len());
        self.buf[self.pos..self.pos + n].copy_from_slice(&bytes[..n]);
        self.pos += n;
        n == bytes.len()
    }
}

#[cfg(feature = "alloc")]
pub struct VecOutput {
    pub vec: alloc::vec::Vec<u8>,
}
#[cfg(feature = "alloc")]
impl From<alloc::vec::Vec<u8>> for VecOutput {
    fn from(vec: alloc::vec::Vec<u8>) -> Self {
        Self { vec }
    }
}
