//! The incremental decode engine.
//!
//! Every reader implements [`ReadState`]: bytes are pushed in with
//! [`ReadState::consume`] in chunks of any size, and once the logical packet
//! has run out the caller calls [`ReadState::finalize`] exactly once to learn
//! whether a complete, consistent value was decoded.
//!
//! Composite readers ([`FixedLengthArrayReadState`],
//! [`VariableLengthArrayReadState`], [`TaggedUnionReadState`], the opaque
//! readers) drive at most one child at a time. Children are built on demand by
//! a [`ReadStateFactory`], so a schema is a tree of factories and decoded
//! values leave the engine through the handlers the factories install (see
//! [`handlers`]).
//!
//! ## Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use xdr_stream::read::{ReadState, VariableLengthArrayReadState, factory, handlers};
//!
//! let values = Rc::new(RefCell::new(Vec::new()));
//! let sink = values.clone();
//! let mut state = VariableLengthArrayReadState::new(
//!     16,
//!     factory(move |_, _| Ok(Some(handlers::collect_uint(sink.clone())))),
//! );
//!
//! let wire = [0, 0, 0, 2, 0, 0, 0, 7, 0, 0, 0, 9];
//! assert_eq!(state.consume(&wire[..5]), (5, false));
//! assert_eq!(state.consume(&wire[5..]), (7, true));
//! state.finalize().unwrap();
//! assert_eq!(*values.borrow(), [7, 9]);
//! ```

mod array;
mod empty;
pub mod handlers;
mod opaque;
mod primitive;
mod union;

use crate::error::{Error, Result};
use std::fmt;
use std::io::BufRead;

pub use array::{FixedLengthArrayReadState, VariableLengthArrayReadState};
pub use empty::EmptyReadState;
pub use handlers::factory;
pub use opaque::{FixedLengthOpaqueReadState, VariableLengthOpaqueReadState, padding};
pub use primitive::PrimitiveReadState;
pub use union::TaggedUnionReadState;

/// Capability set shared by every reader.
pub trait ReadState {
    /// Offers `bytes` to the reader. Returns how many of them it used (never
    /// more than offered) and whether its logical unit is complete.
    ///
    /// A reader that fails reports completion along with the bytes it used
    /// before the failure, then `(0, true)` on every later call until reset.
    fn consume(&mut self, bytes: &[u8]) -> (usize, bool);

    /// Validates the terminal state once the packet's bytes are exhausted.
    fn finalize(&mut self) -> Result<()>;

    /// Restores the reader to its configured initial state.
    fn reset(&mut self);
}

/// Builds the child reader for an array index or union discriminant.
///
/// Called with `(index, element_count)` by arrays and `(discriminant, 0)` by
/// unions. `Ok(None)` means "no such element/arm".
pub type ReadStateFactory = Box<dyn FnMut(u32, u32) -> Result<Option<DecodeState>>>;

/// A reader of any kind.
pub enum DecodeState {
    Primitive(PrimitiveReadState),
    FixedArray(FixedLengthArrayReadState),
    VarArray(VariableLengthArrayReadState),
    FixedOpaque(FixedLengthOpaqueReadState),
    VarOpaque(VariableLengthOpaqueReadState),
    TaggedUnion(TaggedUnionReadState),
    Empty(EmptyReadState),
    /// A caller-supplied reader, typically a byte sink or a value handler.
    Custom(Box<dyn ReadState>),
}

impl DecodeState {
    pub fn custom<S: ReadState + 'static>(state: S) -> Self {
        DecodeState::Custom(Box::new(state))
    }

    pub fn empty() -> Self {
        DecodeState::Empty(EmptyReadState)
    }

    fn kind(&self) -> &'static str {
        match self {
            DecodeState::Primitive(_) => "Primitive",
            DecodeState::FixedArray(_) => "FixedArray",
            DecodeState::VarArray(_) => "VarArray",
            DecodeState::FixedOpaque(_) => "FixedOpaque",
            DecodeState::VarOpaque(_) => "VarOpaque",
            DecodeState::TaggedUnion(_) => "TaggedUnion",
            DecodeState::Empty(_) => "Empty",
            DecodeState::Custom(_) => "Custom",
        }
    }

    fn as_read_state(&mut self) -> &mut dyn ReadState {
        match self {
            DecodeState::Primitive(s) => s,
            DecodeState::FixedArray(s) => s,
            DecodeState::VarArray(s) => s,
            DecodeState::FixedOpaque(s) => s,
            DecodeState::VarOpaque(s) => s,
            DecodeState::TaggedUnion(s) => s,
            DecodeState::Empty(s) => s,
            DecodeState::Custom(s) => s.as_mut(),
        }
    }
}

impl ReadState for DecodeState {
    fn consume(&mut self, bytes: &[u8]) -> (usize, bool) {
        self.as_read_state().consume(bytes)
    }

    fn finalize(&mut self) -> Result<()> {
        self.as_read_state().finalize()
    }

    fn reset(&mut self) {
        self.as_read_state().reset()
    }
}

impl fmt::Debug for DecodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeState::Primitive(s) => f.debug_tuple("Primitive").field(s).finish(),
            DecodeState::FixedArray(s) => f.debug_tuple("FixedArray").field(s).finish(),
            DecodeState::VarArray(s) => f.debug_tuple("VarArray").field(s).finish(),
            DecodeState::FixedOpaque(s) => f.debug_tuple("FixedOpaque").field(s).finish(),
            DecodeState::VarOpaque(s) => f.debug_tuple("VarOpaque").field(s).finish(),
            DecodeState::TaggedUnion(s) => f.debug_tuple("TaggedUnion").field(s).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

macro_rules! from_state {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for DecodeState {
                fn from(state: $ty) -> Self {
                    DecodeState::$variant(state)
                }
            }
        )*
    };
}

from_state!(
    Primitive(PrimitiveReadState),
    FixedArray(FixedLengthArrayReadState),
    VarArray(VariableLengthArrayReadState),
    FixedOpaque(FixedLengthOpaqueReadState),
    VarOpaque(VariableLengthOpaqueReadState),
    TaggedUnion(TaggedUnionReadState),
    Empty(EmptyReadState),
);

/// Offers `bytes` to `child` on behalf of `what`, rejecting a child that
/// claims more than it was given.
pub(crate) fn consume_child<S: ReadState + ?Sized>(
    what: &'static str,
    child: &mut S,
    bytes: &[u8],
) -> Result<(usize, bool)> {
    let (read, done) = child.consume(bytes);
    if read > bytes.len() {
        return Err(Error::OverRead {
            what,
            read,
            offered: bytes.len(),
        });
    }
    Ok((read, done))
}

// ── Drivers ────────────────────────────────────────────────────────────────

/// Decodes one packet held entirely in `input`, then finalizes.
///
/// Returns how many bytes the packet occupied; anything after that is left to
/// the caller.
pub fn decode_bytes<S: ReadState + ?Sized>(state: &mut S, input: &[u8]) -> Result<usize> {
    let (read, _) = consume_child("Read state", state, input)?;
    state.finalize()?;
    Ok(read)
}

/// Decodes one packet from a buffered reader, chunk by chunk, then finalizes.
///
/// Only the bytes the packet occupies are consumed from `reader`, so the next
/// packet can be decoded from the same reader. Returns the packet length.
pub fn decode_from_reader<S, R>(state: &mut S, reader: &mut R) -> Result<u64>
where
    S: ReadState + ?Sized,
    R: BufRead + ?Sized,
{
    let mut total: u64 = 0;
    loop {
        let chunk = reader.fill_buf()?;
        if chunk.is_empty() {
            break;
        }
        let offered = chunk.len();
        let (read, done) = consume_child("Read state", state, chunk)?;
        reader.consume(read);
        total += read as u64;
        if done {
            break;
        }
        if read == 0 {
            return Err(Error::Stalled {
                what: "Read state",
                offered,
            });
        }
    }
    state.finalize()?;
    Ok(total)
}
