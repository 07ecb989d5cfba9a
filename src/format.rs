//! Command-stream vocabulary shared by the encoder and the decoder
//!
//! Every command starts with a control byte whose top three bits select the
//! shape:
//!
//! | top bits | bytes                          | meaning                              |
//! |----------|--------------------------------|--------------------------------------|
//! | `000`    | `000nnnnn` + `n+1` literals    | literal run of 1..=32 bytes          |
//! | `001..110` | `lllddddd dddddddd`          | copy `l+2` bytes from `d+1` back     |
//! | `111`    | `111ddddd llllllll dddddddd`   | copy `l+9` bytes from `d+1` back     |
//!
//! There is no header, no level marker and no terminator.

use crate::decompress::DecompressError;

pub(crate) const HTAB_LOG2: usize = 13;
pub(crate) const HTAB_SZ: usize = 1 << HTAB_LOG2;

/// Furthest back a single command can reach, in bytes
pub const MAX_DISTANCE: usize = 8192;
/// Most literal bytes a single command can carry
pub const MAX_LITERAL_RUN: usize = 32;
/// Shortest copy a back-reference can express
pub const MIN_MATCH_LEN: usize = 3;
/// Longest copy a single back-reference can express
pub const MAX_MATCH_LEN: usize = 0xff + 9;
/// Longest copy that still fits the 2 byte form
pub(crate) const SHORT_MATCH_MAX: usize = 8;
/// Matches longer than [MAX_MATCH_LEN] are emitted as pieces of this length
///
/// Using 262 rather than 264 keeps the remainder at 3 or more bytes.
pub(crate) const MATCH_CHUNK_LEN: usize = 0xff - 2 + 9;

/// Upper bound on the compressed size of an `n` byte input
///
/// Literal runs cost one extra byte per 32, and a match never costs more
/// bytes than it covers minus one, so the worst case is an all-literal stream.
pub const fn max_compressed_len(n: usize) -> usize {
    n + n / MAX_LITERAL_RUN + 1
}

/// A single decoded command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Copy these bytes verbatim
    Literals(&'a [u8]),
    /// Copy `len` bytes starting `disp + 1` bytes before the current end of output
    Backref { disp: usize, len: usize },
}
impl Command<'_> {
    /// Number of stream bytes this command occupies
    pub fn encoded_len(&self) -> usize {
        match self {
            Command::Literals(lits) => 1 + lits.len(),
            Command::Backref { len, .. } if *len <= SHORT_MATCH_MAX => 2,
            Command::Backref { .. } => 3,
        }
    }

    /// Number of output bytes this command produces
    pub fn output_len(&self) -> usize {
        match self {
            Command::Literals(lits) => lits.len(),
            Command::Backref { len, .. } => *len,
        }
    }
}

/// Iterator over the commands in a compressed stream
///
/// Stops after the first error.
#[derive(Debug, Clone)]
pub struct Commands<'a> {
    inp: &'a [u8],
    failed: bool,
}
impl<'a> Commands<'a> {
    /// Start reading commands from the beginning of `inp`
    pub fn new(inp: &'a [u8]) -> Self {
        Self { inp, failed: false }
    }

    /// Number of stream bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.inp.len()
    }
}
impl<'a> Iterator for Commands<'a> {
    type Item = Result<Command<'a>, DecompressError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let (&ctrl, rest) = self.inp.split_first()?;
        match parse_command(ctrl, rest) {
            Ok((cmd, rest)) => {
                self.inp = rest;
                Some(Ok(cmd))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn parse_command(ctrl: u8, rest: &[u8]) -> Result<(Command<'_>, &[u8]), DecompressError> {
    let kind = ctrl >> 5;
    if kind == 0 {
        let n = ctrl as usize + 1;
        if rest.len() < n {
            return Err(DecompressError::InputTruncated);
        }
        let (lits, rest) = rest.split_at(n);
        return Ok((Command::Literals(lits), rest));
    }

    let disp_hi = ((ctrl & 0b000_11111) as usize) << 8;
    if kind < 7 {
        let [disp_lo, rest @ ..] = rest else {
            return Err(DecompressError::InputTruncated);
        };
        let cmd = Command::Backref {
            disp: disp_hi | *disp_lo as usize,
            len: kind as usize + 2,
        };
        Ok((cmd, rest))
    } else {
        let [len, disp_lo, rest @ ..] = rest else {
            return Err(DecompressError::InputTruncated);
        };
        let cmd = Command::Backref {
            disp: disp_hi | *disp_lo as usize,
            len: *len as usize + 9,
        };
        Ok((cmd, rest))
    }
}
