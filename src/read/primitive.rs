//! Fixed-size XDR words: `int`, `unsigned int`, `float` (4 bytes) and
//! `hyper`, `unsigned hyper`, `double` (8 bytes).

use super::ReadState;
use crate::error::{Error, Result};

/// Accumulates one big-endian 4- or 8-byte word across any number of
/// `consume` calls.
///
/// The reader never takes more than its own width, so whatever is left of a
/// chunk belongs to the next value in the stream.
#[derive(Debug, Clone)]
pub struct PrimitiveReadState {
    width: usize,
    bytes: [u8; 8],
    fill: usize,
}

fn check_width(width: usize) -> Result<()> {
    match width {
        4 | 8 => Ok(()),
        other => Err(Error::InvalidPrimitiveSize(other)),
    }
}

impl PrimitiveReadState {
    /// Creates a reader for a word of `width` bytes (4 or 8).
    pub fn new(width: usize) -> Result<Self> {
        check_width(width)?;
        Ok(PrimitiveReadState {
            width,
            bytes: [0; 8],
            fill: 0,
        })
    }

    /// A 4-byte reader (`int`, `unsigned int`, `float`, enum and union tags).
    pub fn word() -> Self {
        PrimitiveReadState {
            width: 4,
            bytes: [0; 8],
            fill: 0,
        }
    }

    /// An 8-byte reader (`hyper`, `unsigned hyper`, `double`).
    pub fn hyper() -> Self {
        PrimitiveReadState {
            width: 8,
            bytes: [0; 8],
            fill: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Whether all `width` bytes have arrived.
    pub fn is_filled(&self) -> bool {
        self.fill == self.width
    }

    /// Reconfigures the width and forgets any bytes seen so far.
    ///
    /// On an invalid width the reader is left untouched.
    pub fn reset_width(&mut self, width: usize) -> Result<()> {
        check_width(width)?;
        self.width = width;
        self.fill = 0;
        Ok(())
    }

    fn filled(&self, expected: usize) -> Result<&[u8]> {
        if self.width != expected {
            return Err(Error::PrimitiveSizeMismatch {
                expected,
                actual: self.width,
            });
        }
        if !self.is_filled() {
            return Err(Error::MissingBytes {
                missing: self.width - self.fill,
                size: self.width,
            });
        }
        Ok(&self.bytes[..expected])
    }

    fn word_bytes(&self) -> Result<[u8; 4]> {
        let b = self.filled(4)?;
        Ok([b[0], b[1], b[2], b[3]])
    }

    fn hyper_bytes(&self) -> Result<[u8; 8]> {
        let b = self.filled(8)?;
        let mut out = [0u8; 8];
        out.copy_from_slice(b);
        Ok(out)
    }

    /// XDR signed integer
    pub fn as_int(&self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.word_bytes()?))
    }

    /// XDR unsigned integer
    pub fn as_uint(&self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.word_bytes()?))
    }

    /// XDR hyper integer
    pub fn as_hyper_int(&self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.hyper_bytes()?))
    }

    /// XDR unsigned hyper integer
    pub fn as_hyper_uint(&self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.hyper_bytes()?))
    }

    /// IEEE 754 single precision
    pub fn as_float(&self) -> Result<f32> {
        Ok(f32::from_bits(self.as_uint()?))
    }

    /// IEEE 754 double precision
    pub fn as_double(&self) -> Result<f64> {
        Ok(f64::from_bits(self.as_hyper_uint()?))
    }
}

impl ReadState for PrimitiveReadState {
    fn consume(&mut self, bytes: &[u8]) -> (usize, bool) {
        let take = (self.width - self.fill).min(bytes.len());
        self.bytes[self.fill..self.fill + take].copy_from_slice(&bytes[..take]);
        self.fill += take;
        (take, self.is_filled())
    }

    fn finalize(&mut self) -> Result<()> {
        if self.is_filled() {
            Ok(())
        } else {
            Err(Error::MissingBytes {
                missing: self.width - self.fill,
                size: self.width,
            })
        }
    }

    /// Keeps the width; the stale buffer is hidden by the fill counter.
    fn reset(&mut self) {
        self.fill = 0;
    }
}
