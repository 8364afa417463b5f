//! # xdr-stream
//!
//! A resumable XDR (eXternal Data Representation, RFC 4506) decode engine and
//! a sequential XDR encoder.
//!
//! ## Overview
//!
//! XDR is the wire encoding used by ONC RPC protocols such as NFS. All values
//! are big-endian, and every item occupies a multiple of 4 bytes (opaque data
//! is padded with zeroes).
//!
//! Transports rarely deliver a whole message at once. The readers in [`read`]
//! accept bytes in chunks of any size (one byte at a time or the whole message)
//! and never buffer more than an 8-byte word: each reader tracks how much of
//! its own value it has seen, never reads into the next value, and hands
//! opaque payloads to a byte sink as they arrive.
//!
//! | XDR | reader |
//! |-----|--------|
//! | `int`, `unsigned int`, `float`, `hyper`, `unsigned hyper`, `double` | [`PrimitiveReadState`] |
//! | `opaque[n]` | [`FixedLengthOpaqueReadState`] |
//! | `opaque<max>`, `string<max>` | [`VariableLengthOpaqueReadState`] |
//! | `T[n]` | [`FixedLengthArrayReadState`] |
//! | `T<max>` | [`VariableLengthArrayReadState`] |
//! | `union switch` | [`TaggedUnionReadState`] |
//! | `void` | [`EmptyReadState`] |
//!
//! Errors are sticky: once a reader fails it reports the same [`Error`] from
//! every later call until it is reset.
//!
//! The encoder in [`write`] emits length prefixes, bodies and padding
//! sequentially from [`Packet`](write::Packet)s, whose size is known up front.
//!
//! ## Example
//!
//! ```rust
//! use xdr_stream::read::{ReadState, TaggedUnionReadState, VariableLengthOpaqueReadState, factory};
//! use xdr_stream::read::handlers::BufferSink;
//! use xdr_stream::{DecodeState, Error};
//!
//! // union switch (unsigned int tag) { case 0: void; case 1: opaque data<16>; }
//! let sink = BufferSink::new();
//! let payload = sink.buffer();
//! let mut state = TaggedUnionReadState::new(factory(move |tag, _| {
//!     Ok(match tag {
//!         0 => Some(DecodeState::empty()),
//!         1 => Some(VariableLengthOpaqueReadState::new(16, sink.clone().into()).into()),
//!         _ => None,
//!     })
//! }))
//! .with_name("result");
//!
//! let wire = [0, 0, 0, 1, 0, 0, 0, 3, b'a', b'b', b'c', 0];
//! for byte in wire.chunks(1) {
//!     state.consume(byte);
//! }
//! state.finalize().unwrap();
//! assert_eq!(*payload.borrow(), b"abc");
//!
//! state.reset();
//! state.consume(&[0, 0, 0, 9]);
//! assert!(matches!(
//!     state.finalize(),
//!     Err(Error::UnrecognizedDiscriminant { discriminant: 9, .. })
//! ));
//! ```

pub mod error;
pub mod read;
pub mod ser;
pub mod write;

pub use error::{Error, Result};
pub use read::{
    DecodeState, EmptyReadState, FixedLengthArrayReadState, FixedLengthOpaqueReadState,
    PrimitiveReadState, ReadState, ReadStateFactory, TaggedUnionReadState,
    VariableLengthArrayReadState, VariableLengthOpaqueReadState, decode_bytes, decode_from_reader,
};
pub use ser::{Serializer, to_bytes, to_writer};
pub use write::{Packet, SerdePacket};
