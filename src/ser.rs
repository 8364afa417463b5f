//! serde `Serializer` producing XDR, so any `Serialize` type can be written as
//! a [`Packet`](crate::write::Packet) through
//! [`SerdePacket`](crate::write::SerdePacket).
//!
//! | serde type | XDR |
//! |------------|-----|
//! | `bool` | `unsigned int` 0 or 1 |
//! | `i8`–`i32`, `u8`–`u32`, `char` | 4-byte `int` / `unsigned int` |
//! | `i64`, `u64` | `hyper` / `unsigned hyper` |
//! | `f32`, `f64` | `float` / `double` |
//! | `str`, bytes | variable-length opaque |
//! | `Option<T>` | 0/1 discriminant, then `T` if present |
//! | unit, unit struct | void |
//! | sequence, map | element count, then the elements (map: key, value pairs) |
//! | tuple, struct | fields back to back |
//! | enum variant | variant index as discriminant, then the fields |

use crate::error::{Error, Result};
use crate::write::{ByteSlicePacket, write_hyper_int, write_hyper_uint, write_int, write_uint, write_variable_opaque_packet};
use serde::ser::{self, Serialize};
use std::io::Write;

/// Serializes `value` into a new buffer.
pub fn to_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    to_writer(&mut buffer, value)?;
    Ok(buffer)
}

/// Serializes `value` straight into `writer`.
pub fn to_writer<W: Write, T: Serialize + ?Sized>(writer: W, value: &T) -> Result<()> {
    value.serialize(&mut Serializer::new(writer))
}

pub struct Serializer<W> {
    writer: W,
}

impl<W: Write> Serializer<W> {
    pub fn new(writer: W) -> Self {
        Serializer { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn count(len: Option<usize>) -> Result<u32> {
        let len = len.ok_or(Error::LengthRequired)?;
        u32::try_from(len)
            .map_err(|_| Error::RangeOverflow(format!("element count {len}")))
    }

    fn opaque(&mut self, bytes: &[u8]) -> Result<()> {
        write_variable_opaque_packet(&ByteSlicePacket(bytes), u32::MAX, &mut self.writer)
    }
}

impl<W: Write> ser::Serializer for &mut Serializer<W> {
    type Ok = ();
    type Error = Error;

    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, v: bool) -> Result<()> {
        write_uint(v as u32, &mut self.writer)
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        write_int(v.into(), &mut self.writer)
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        write_int(v.into(), &mut self.writer)
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        write_int(v, &mut self.writer)
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        write_hyper_int(v, &mut self.writer)
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        write_uint(v.into(), &mut self.writer)
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        write_uint(v.into(), &mut self.writer)
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        write_uint(v, &mut self.writer)
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        write_hyper_uint(v, &mut self.writer)
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        write_uint(v.to_bits(), &mut self.writer)
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        write_hyper_uint(v.to_bits(), &mut self.writer)
    }

    fn serialize_char(self, v: char) -> Result<()> {
        write_uint(v.into(), &mut self.writer)
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.opaque(v.as_bytes())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.opaque(v)
    }

    fn serialize_none(self) -> Result<()> {
        write_uint(0, &mut self.writer)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<()> {
        write_uint(1, &mut self.writer)?;
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
    ) -> Result<()> {
        write_uint(variant_index, &mut self.writer)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<()> {
        write_uint(variant_index, &mut self.writer)?;
        value.serialize(self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self> {
        write_uint(Serializer::<W>::count(len)?, &mut self.writer)?;
        Ok(self)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self> {
        Ok(self)
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> Result<Self> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self> {
        write_uint(variant_index, &mut self.writer)?;
        Ok(self)
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self> {
        write_uint(Serializer::<W>::count(len)?, &mut self.writer)?;
        Ok(self)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self> {
        write_uint(variant_index, &mut self.writer)?;
        Ok(self)
    }
}

// Compound values need no framing beyond what was written when they opened.

macro_rules! compound {
    ($trait:ident, $method:ident) => {
        impl<W: Write> ser::$trait for &mut Serializer<W> {
            type Ok = ();
            type Error = Error;

            fn $method<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
                value.serialize(&mut **self)
            }

            fn end(self) -> Result<()> {
                Ok(())
            }
        }
    };
}

compound!(SerializeSeq, serialize_element);
compound!(SerializeTuple, serialize_element);
compound!(SerializeTupleStruct, serialize_field);
compound!(SerializeTupleVariant, serialize_field);

macro_rules! named_compound {
    ($trait:ident) => {
        impl<W: Write> ser::$trait for &mut Serializer<W> {
            type Ok = ();
            type Error = Error;

            fn serialize_field<T: Serialize + ?Sized>(
                &mut self,
                _key: &'static str,
                value: &T,
            ) -> Result<()> {
                value.serialize(&mut **self)
            }

            fn end(self) -> Result<()> {
                Ok(())
            }
        }
    };
}

named_compound!(SerializeStruct);
named_compound!(SerializeStructVariant);

impl<W: Write> ser::SerializeMap for &mut Serializer<W> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
        key.serialize(&mut **self)
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        Ok(())
    }
}
