use super::CountingWriter;
use crate::error::{Error, Result};
use crate::ser;
use serde::Serialize;
use std::io::{self, Write};

/// A value whose encoded size is known before it is written.
pub trait Packet {
    /// Number of bytes [`Packet::write_to`] will emit.
    fn byte_size(&self) -> Result<u32>;

    fn write_to(&self, writer: &mut dyn Write) -> Result<()>;
}

impl<P: Packet + ?Sized> Packet for &P {
    fn byte_size(&self) -> Result<u32> {
        (**self).byte_size()
    }

    fn write_to(&self, writer: &mut dyn Write) -> Result<()> {
        (**self).write_to(writer)
    }
}

/// Fills `count` bytes after a short body.
pub type BytePadder = fn(&mut dyn Write, u32) -> Result<()>;

/// Writes `count` zero bytes.
pub fn zero_byte_padder(writer: &mut dyn Write, count: u32) -> Result<()> {
    const ZEROES: [u8; 256] = [0; 256];
    let mut remaining = count as usize;
    while remaining > 0 {
        let n = remaining.min(ZEROES.len());
        writer.write_all(&ZEROES[..n])?;
        remaining -= n;
    }
    Ok(())
}

/// Raw bytes, written as-is.
#[derive(Debug, Clone, Copy)]
pub struct ByteSlicePacket<'a>(pub &'a [u8]);

impl Packet for ByteSlicePacket<'_> {
    fn byte_size(&self) -> Result<u32> {
        u32::try_from(self.0.len()).map_err(|_| {
            Error::RangeOverflow(format!("size of slice ({} bytes)", self.0.len()))
        })
    }

    fn write_to(&self, writer: &mut dyn Write) -> Result<()> {
        writer.write_all(self.0)?;
        Ok(())
    }
}

/// Pads a shorter packet up to `required_length` bytes.
#[derive(Debug, Clone)]
pub struct PaddingPacket<P> {
    pub short_packet: P,
    pub required_length: u32,
    /// Defaults to [`zero_byte_padder`].
    pub padding: Option<BytePadder>,
}

impl<P: Packet> PaddingPacket<P> {
    pub fn new(short_packet: P, required_length: u32) -> Self {
        PaddingPacket {
            short_packet,
            required_length,
            padding: None,
        }
    }

    pub fn with_padder(mut self, padder: BytePadder) -> Self {
        self.padding = Some(padder);
        self
    }
}

impl<P: Packet> Packet for PaddingPacket<P> {
    fn byte_size(&self) -> Result<u32> {
        Ok(self.required_length)
    }

    fn write_to(&self, writer: &mut dyn Write) -> Result<()> {
        let size = self.short_packet.byte_size()?;
        if size > self.required_length {
            return Err(Error::NegativePadding {
                size,
                required: self.required_length,
            });
        }
        self.short_packet.write_to(writer)?;
        let remainder = self.required_length - size;
        if remainder > 0 {
            let padder = self.padding.unwrap_or(zero_byte_padder);
            padder(writer, remainder)?;
        }
        Ok(())
    }
}

/// Any `serde::Serialize` value, encoded with the XDR serializer in
/// [`crate::ser`].
///
/// Sizing serializes the value once into a byte counter, so it costs a full
/// encoding pass without allocating.
#[derive(Debug)]
pub struct SerdePacket<'a, T: ?Sized>(pub &'a T);

impl<T: Serialize + ?Sized> Packet for SerdePacket<'_, T> {
    fn byte_size(&self) -> Result<u32> {
        let mut counter = CountingWriter::new(io::sink());
        ser::to_writer(&mut counter, self.0)?;
        Ok(counter.count())
    }

    fn write_to(&self, writer: &mut dyn Write) -> Result<()> {
        ser::to_writer(writer, self.0)
    }
}
