//! The sequential XDR encoder.
//!
//! ## Wire format summary
//! - All values are big-endian (network byte order)
//! - `int`/`unsigned int`/`float`: 4 bytes; `hyper`/`unsigned hyper`/`double`: 8 bytes
//! - Opaque data is followed by 0–3 zero bytes up to a 4-byte boundary
//! - Variable-length forms carry a `uint32` length (byte or element count)
//! - Unions: `uint32` discriminant, then the selected arm
//!
//! Length-prefixed forms need their size before the body is written, which is
//! what [`Packet::byte_size`] provides.

mod packet;
mod structures;

use crate::error::{Error, Result};
use std::io::Write;

pub use packet::{BytePadder, ByteSlicePacket, Packet, PaddingPacket, SerdePacket, zero_byte_padder};
pub use structures::{
    ElementPadder, write_fixed_array, write_fixed_opaque_generator, write_fixed_opaque_packet,
    write_fixed_opaque_reader, write_padding, write_tagged_union, write_variable_array,
    write_variable_opaque_generator, write_variable_opaque_packet, write_variable_opaque_reader,
};

/// Bulk copy buffer used when opaque data is streamed from an `io::Read`.
pub const TRANSFER_BUFFER_SIZE: usize = 4096;

// ── Primitives ─────────────────────────────────────────────────────────────

/// XDR signed integer: 4 bytes, two's complement
pub fn write_int<W: Write + ?Sized>(value: i32, writer: &mut W) -> Result<()> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

/// XDR unsigned integer: 4 bytes
pub fn write_uint<W: Write + ?Sized>(value: u32, writer: &mut W) -> Result<()> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

/// XDR hyper integer: 8 bytes, two's complement
pub fn write_hyper_int<W: Write + ?Sized>(value: i64, writer: &mut W) -> Result<()> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

/// XDR unsigned hyper integer: 8 bytes
pub fn write_hyper_uint<W: Write + ?Sized>(value: u64, writer: &mut W) -> Result<()> {
    writer.write_all(&value.to_be_bytes())?;
    Ok(())
}

/// IEEE 754 single precision: 4 bytes
pub fn write_float<W: Write + ?Sized>(value: f32, writer: &mut W) -> Result<()> {
    write_uint(value.to_bits(), writer)
}

/// IEEE 754 double precision: 8 bytes
pub fn write_double<W: Write + ?Sized>(value: f64, writer: &mut W) -> Result<()> {
    write_hyper_uint(value.to_bits(), writer)
}

// ── Byte counting ──────────────────────────────────────────────────────────

/// Forwards writes while counting them, failing once the total would leave
/// the range of `u32`.
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    count: u32,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        CountingWriter { inner, count: 0 }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Checked `total + chunk` in `u32`, described as `what` on failure.
pub(crate) fn add_count(total: u32, chunk: usize, what: &str) -> Result<u32> {
    u32::try_from(chunk)
        .ok()
        .and_then(|chunk| total.checked_add(chunk))
        .ok_or_else(|| {
            Error::RangeOverflow(format!(
                "chunk of size {chunk} added to total {what} size {total}"
            ))
        })
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count = add_count(self.count, written, "write")
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
