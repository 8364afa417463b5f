use serde::ser;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the decode engine and the encoder.
///
/// Read states keep the first error they hit and hand back a clone of it on
/// every later call, so the type is `Clone` and wrapped causes are boxed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A free-form message, from a custom handler or from serde
    #[error("{0}")]
    Message(String),

    /// Primitive words are 4 or 8 bytes wide
    #[error("expected primitive size to be 4 or 8, not {0}")]
    InvalidPrimitiveSize(usize),

    /// Input ended before a primitive was filled
    #[error("missing {missing} bytes for primitive of size {size}")]
    MissingBytes { missing: usize, size: usize },

    /// A primitive was read through an accessor of the wrong width
    #[error("primitive of size {actual} cannot be read as a {expected}-byte value")]
    PrimitiveSizeMismatch { expected: usize, actual: usize },

    /// Input ended inside opaque data (body or padding)
    #[error("missing {missing} of {expected} bytes of padded opaque data")]
    MissingOpaqueBytes { missing: u64, expected: u64 },

    /// A child state claimed to consume more than it was offered
    #[error("{what} read {read} bytes, but was supposed to only read {offered}")]
    OverRead {
        what: &'static str,
        read: usize,
        offered: usize,
    },

    /// A child state made no progress on a non-empty input without completing
    #[error("{what} accepted none of the {offered} bytes offered")]
    Stalled { what: &'static str, offered: usize },

    /// A byte or element count left the range of `u32`
    #[error("{0} exceeds the range of uint32")]
    RangeOverflow(String),

    /// A length read from the wire is above the schema's bound
    #[error("{kind} has maximum length {max}, but encountered length {got}")]
    MaxLengthExceeded {
        kind: &'static str,
        max: u32,
        got: u32,
    },

    /// A handler factory produced no state for an array index
    #[error("read state factory returned no handler for index {index} of {count}")]
    MissingHandler { index: u32, count: u32 },

    /// An array element (or its factory) failed
    #[error("element {index} of {count}: {source}")]
    Element {
        index: u32,
        count: u32,
        source: Box<Error>,
    },

    /// The byte sink of an opaque reader failed to finalize
    #[error("{} reported error: {source}", label(.name, "Opaque data handler"))]
    OpaqueHandler { name: String, source: Box<Error> },

    /// The byte sink of an opaque reader completed before the payload ended
    #[error("{} completed with {remaining} bytes of opaque data left", label(.name, "Opaque data handler"))]
    HandlerFinishedEarly { name: String, remaining: u32 },

    /// No union arm exists for the decoded discriminant
    #[error("{} reported unrecognized discriminant: {discriminant}", label(.name, "Tagged union"))]
    UnrecognizedDiscriminant { discriminant: u32, name: String },

    /// Encoder: the produced body does not match the announced size
    #[error("expected {what} length ({expected}) does not match actual length ({actual})")]
    LengthMismatch {
        what: &'static str,
        expected: u32,
        actual: u32,
    },

    /// Encoder: a packet is longer than the size it should be padded to
    #[error("cannot pad packet of size {size} to size {required}: padding would be negative")]
    NegativePadding { size: u32, required: u32 },

    /// Encoder: a sequence or map length was not known ahead of time
    #[error("sequence length must be known before serialization (XDR requires a length prefix)")]
    LengthRequired,

    /// An I/O error from the underlying reader or writer
    #[error("I/O error: {0}")]
    Io(String),
}

fn label<'a>(name: &'a str, fallback: &'a str) -> &'a str {
    if name.is_empty() { fallback } else { name }
}

impl Error {
    /// Builds a [`Error::Message`] from anything displayable.
    pub fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }

    /// The innermost cause, skipping handler and element context.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Element { source, .. } | Error::OpaqueHandler { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }

    /// Whether the input ended before the value was complete.
    pub fn is_missing_bytes(&self) -> bool {
        matches!(
            self.root_cause(),
            Error::MissingBytes { .. } | Error::MissingOpaqueBytes { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Message(msg.to_string())
    }
}
