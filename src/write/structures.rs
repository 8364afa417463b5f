//! Writers for opaque data, arrays and unions.

use super::{BytePadder, CountingWriter, Packet, TRANSFER_BUFFER_SIZE, add_count, write_uint};
use crate::error::{Error, Result};
use crate::read::padding;
use std::io::{ErrorKind, Read, Write};

/// Writes one filler element in place of a missing array element.
pub type ElementPadder<'a> = &'a mut dyn FnMut(&mut dyn Write) -> Result<()>;

/// Writes the zero bytes that follow `length` bytes of opaque data.
pub fn write_padding(length: u32, writer: &mut dyn Write) -> Result<()> {
    const ZEROES: [u8; 3] = [0; 3];
    writer.write_all(&ZEROES[..padding(length) as usize])?;
    Ok(())
}

fn check_max(what: &'static str, length: u32, max: u32) -> Result<()> {
    if length > max {
        return Err(Error::MaxLengthExceeded {
            kind: what,
            max,
            got: length,
        });
    }
    Ok(())
}

/// Reconciles the produced body size with the announced one: a short body is
/// filled by `padder` when there is one, anything else is a mismatch.
fn fill_short_body(
    actual: u32,
    expected: u32,
    writer: &mut dyn Write,
    padder: Option<BytePadder>,
) -> Result<()> {
    if actual == expected {
        return Ok(());
    }
    match padder {
        Some(padder) if actual < expected => padder(writer, expected - actual),
        _ => Err(Error::LengthMismatch {
            what: "stream",
            expected,
            actual,
        }),
    }
}

// ── Fixed-length opaque ────────────────────────────────────────────────────

/// `opaque[n]` from a packet of size `n`: the body then its padding.
pub fn write_fixed_opaque_packet(packet: &dyn Packet, writer: &mut dyn Write) -> Result<()> {
    let size = packet.byte_size()?;
    packet.write_to(writer)?;
    write_padding(size, writer)
}

/// `opaque[expected_size]` copied from `reader` until EOF.
pub fn write_fixed_opaque_reader(
    reader: &mut dyn Read,
    expected_size: u32,
    writer: &mut dyn Write,
    padder: Option<BytePadder>,
) -> Result<()> {
    let mut buffer = [0u8; TRANSFER_BUFFER_SIZE];
    let mut actual: u32 = 0;
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        actual = add_count(actual, n, "read")?;
        writer.write_all(&buffer[..n])?;
    }
    fill_short_body(actual, expected_size, writer, padder)?;
    write_padding(expected_size, writer)
}

/// `opaque[expected_size]` produced by `generator`, which writes the body.
pub fn write_fixed_opaque_generator<G>(
    generator: G,
    expected_size: u32,
    writer: &mut dyn Write,
    padder: Option<BytePadder>,
) -> Result<()>
where
    G: FnOnce(&mut dyn Write) -> Result<()>,
{
    let mut counter = CountingWriter::new(&mut *writer);
    generator(&mut counter)?;
    let actual = counter.count();
    fill_short_body(actual, expected_size, writer, padder)?;
    write_padding(expected_size, writer)
}

// ── Variable-length opaque ─────────────────────────────────────────────────

/// `opaque<max_size>` from a packet: length, body, padding.
pub fn write_variable_opaque_packet(
    packet: &dyn Packet,
    max_size: u32,
    writer: &mut dyn Write,
) -> Result<()> {
    let size = packet.byte_size()?;
    check_max("Packet", size, max_size)?;
    write_uint(size, writer)?;
    packet.write_to(writer)?;
    write_padding(size, writer)
}

pub fn write_variable_opaque_reader(
    reader: &mut dyn Read,
    expected_size: u32,
    max_size: u32,
    writer: &mut dyn Write,
    padder: Option<BytePadder>,
) -> Result<()> {
    check_max("Packet", expected_size, max_size)?;
    write_uint(expected_size, writer)?;
    write_fixed_opaque_reader(reader, expected_size, writer, padder)
}

pub fn write_variable_opaque_generator<G>(
    generator: G,
    expected_size: u32,
    max_size: u32,
    writer: &mut dyn Write,
    padder: Option<BytePadder>,
) -> Result<()>
where
    G: FnOnce(&mut dyn Write) -> Result<()>,
{
    check_max("Packet", expected_size, max_size)?;
    write_uint(expected_size, writer)?;
    write_fixed_opaque_generator(generator, expected_size, writer, padder)
}

// ── Arrays ─────────────────────────────────────────────────────────────────

/// `type[expected_size]`: the elements back to back, no count prefix.
///
/// Missing trailing elements are written by `padder` if given; otherwise any
/// count mismatch is an error.
pub fn write_fixed_array<I>(
    elements: I,
    expected_size: u32,
    writer: &mut dyn Write,
    padder: Option<ElementPadder<'_>>,
) -> Result<()>
where
    I: IntoIterator,
    I::Item: Packet,
{
    let mut actual: u32 = 0;
    for element in elements {
        actual = actual.checked_add(1).ok_or_else(|| {
            Error::RangeOverflow("generated element count".to_string())
        })?;
        element.write_to(writer)?;
    }
    if actual == expected_size {
        return Ok(());
    }
    match padder {
        Some(padder) if actual < expected_size => {
            for _ in actual..expected_size {
                padder(&mut *writer)?;
            }
            Ok(())
        }
        _ => Err(Error::LengthMismatch {
            what: "array",
            expected: expected_size,
            actual,
        }),
    }
}

/// `type<max_size>`: element count, then the elements.
pub fn write_variable_array<I>(
    elements: I,
    expected_size: u32,
    max_size: u32,
    writer: &mut dyn Write,
    padder: Option<ElementPadder<'_>>,
) -> Result<()>
where
    I: IntoIterator,
    I::Item: Packet,
{
    check_max("Element count", expected_size, max_size)?;
    write_uint(expected_size, writer)?;
    write_fixed_array(elements, expected_size, writer, padder)
}

// ── Unions ─────────────────────────────────────────────────────────────────

/// Discriminant followed by the arm; a void arm is an empty packet.
pub fn write_tagged_union(
    discriminant: u32,
    arm: &dyn Packet,
    writer: &mut dyn Write,
) -> Result<()> {
    write_uint(discriminant, writer)?;
    arm.write_to(writer)
}
