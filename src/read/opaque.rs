//! Opaque data: `opaque name[n]` and `opaque name<max>`.
//!
//! Payload bytes are forwarded to a byte sink as they arrive; the 0–3 zero
//! bytes of padding that follow are skipped and never reach the sink.

use super::{DecodeState, PrimitiveReadState, ReadState, consume_child};
use crate::error::{Error, Result};
use std::fmt;
use tracing::{debug, trace};

/// Number of zero bytes that follow `length` bytes of opaque data.
pub fn padding(length: u32) -> u32 {
    (4 - length % 4) % 4
}

/// Reads exactly `expected_length` bytes of payload plus their padding.
pub struct FixedLengthOpaqueReadState {
    expected_length: u32,
    handler: Box<DecodeState>,
    handler_name: String,
    current_length: u32,
    padding_read: u32,
    first_error: Option<Error>,
}

impl FixedLengthOpaqueReadState {
    /// `handler` receives the unpadded payload. It is never reset by this
    /// reader; it belongs to the caller.
    pub fn new(expected_length: u32, handler: DecodeState) -> Self {
        FixedLengthOpaqueReadState {
            expected_length,
            handler: Box::new(handler),
            handler_name: String::new(),
            current_length: 0,
            padding_read: 0,
            first_error: None,
        }
    }

    /// Names the handler in error messages.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.handler_name = name.into();
        self
    }

    pub fn expected_length(&self) -> u32 {
        self.expected_length
    }

    /// Resets and expects `expected_length` payload bytes from now on.
    pub fn reset_length(&mut self, expected_length: u32) {
        self.reset();
        self.expected_length = expected_length;
    }

    pub fn handler(&self) -> &DecodeState {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut DecodeState {
        &mut self.handler
    }

    fn fail(&mut self, err: Error) {
        debug!(handler = %self.handler_name, error = %err, "opaque read failed");
        self.first_error = Some(err);
    }

    /// Offers `bytes` to the sink, then skips padding. `read` tracks the bytes
    /// used so far, including on failure.
    fn step(&mut self, bytes: &[u8], read: &mut usize) -> Result<bool> {
        let offered = u32::try_from(bytes.len()).map_err(|_| {
            Error::RangeOverflow(format!("update with chunk of size {}", bytes.len()))
        })?;
        let pad = padding(self.expected_length);
        if self.expected_length.checked_add(pad).is_none() {
            return Err(Error::RangeOverflow(format!(
                "opaque length {} plus {} bytes of padding",
                self.expected_length, pad
            )));
        }

        let mut used: u32 = 0;
        while self.current_length < self.expected_length && used < offered {
            let want = (self.expected_length - self.current_length).min(offered - used);
            let chunk = &bytes[used as usize..(used + want) as usize];
            let (taken, done) = consume_child("Opaque data handler", self.handler.as_mut(), chunk)?;
            // taken <= want <= u32::MAX
            let taken = taken as u32;
            self.current_length = self.current_length.checked_add(taken).ok_or_else(|| {
                Error::RangeOverflow(format!(
                    "chunk of size {} added to {} bytes of opaque data",
                    taken, self.current_length
                ))
            })?;
            used += taken;
            *read = used as usize;
            if self.current_length < self.expected_length {
                if done {
                    return Err(self.handler_finished_early());
                }
                if taken == 0 {
                    return Err(Error::Stalled {
                        what: "Opaque data handler",
                        offered: chunk.len(),
                    });
                }
            }
        }
        if self.current_length < self.expected_length {
            return Ok(false);
        }

        let skip = (pad - self.padding_read).min(offered - used);
        self.padding_read += skip;
        *read = (used + skip) as usize;
        Ok(self.padding_read == pad)
    }

    /// The sink stopped before the payload ended: it either failed or is
    /// shorter than the declared length.
    fn handler_finished_early(&mut self) -> Error {
        match self.handler.finalize() {
            Err(err) => Error::OpaqueHandler {
                name: self.handler_name.clone(),
                source: Box::new(err),
            },
            Ok(()) => Error::HandlerFinishedEarly {
                name: self.handler_name.clone(),
                remaining: self.expected_length - self.current_length,
            },
        }
    }

    fn missing(&self) -> u64 {
        let total = self.expected_length as u64 + padding(self.expected_length) as u64;
        total - self.current_length as u64 - self.padding_read as u64
    }
}

impl ReadState for FixedLengthOpaqueReadState {
    fn consume(&mut self, bytes: &[u8]) -> (usize, bool) {
        if self.first_error.is_some() {
            return (0, true);
        }
        let mut read = 0;
        match self.step(bytes, &mut read) {
            Ok(done) => (read, done),
            Err(err) => {
                self.fail(err);
                (read, true)
            }
        }
    }

    fn finalize(&mut self) -> Result<()> {
        if let Some(err) = &self.first_error {
            return Err(err.clone());
        }
        if let Err(err) = self.handler.finalize() {
            let err = Error::OpaqueHandler {
                name: self.handler_name.clone(),
                source: Box::new(err),
            };
            self.fail(err.clone());
            return Err(err);
        }
        let missing = self.missing();
        if missing > 0 {
            let err = Error::MissingOpaqueBytes {
                missing,
                expected: self.expected_length as u64 + padding(self.expected_length) as u64,
            };
            self.fail(err.clone());
            return Err(err);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.current_length = 0;
        self.padding_read = 0;
        self.first_error = None;
    }
}

impl fmt::Debug for FixedLengthOpaqueReadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedLengthOpaqueReadState")
            .field("expected_length", &self.expected_length)
            .field("handler_name", &self.handler_name)
            .field("current_length", &self.current_length)
            .field("padding_read", &self.padding_read)
            .field("first_error", &self.first_error)
            .finish_non_exhaustive()
    }
}

/// Reads a `uint32` length, checks it against `max_length`, then reads that
/// many payload bytes plus padding.
pub struct VariableLengthOpaqueReadState {
    length: PrimitiveReadState,
    body: FixedLengthOpaqueReadState,
    max_length: u32,
    in_body: bool,
    first_error: Option<Error>,
}

impl VariableLengthOpaqueReadState {
    pub fn new(max_length: u32, handler: DecodeState) -> Self {
        VariableLengthOpaqueReadState {
            length: PrimitiveReadState::word(),
            body: FixedLengthOpaqueReadState::new(0, handler),
            max_length,
            in_body: false,
            first_error: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.body = self.body.with_name(name);
        self
    }

    pub fn max_length(&self) -> u32 {
        self.max_length
    }

    /// The decoded length prefix, once it has fully arrived.
    pub fn length(&self) -> Option<u32> {
        self.length.as_uint().ok()
    }

    pub fn handler(&self) -> &DecodeState {
        self.body.handler()
    }

    fn fail(&mut self, err: Error) -> Error {
        debug!(error = %err, "variable-length opaque read failed");
        self.first_error = Some(err.clone());
        err
    }

    /// Switches to the body once the length prefix is complete.
    fn enter_body(&mut self) -> Result<()> {
        let length = self.length.as_uint()?;
        if length > self.max_length {
            return Err(Error::MaxLengthExceeded {
                kind: "Variable-length opaque data",
                max: self.max_length,
                got: length,
            });
        }
        trace!(length, max = self.max_length, "opaque length prefix decoded");
        self.body.reset_length(length);
        self.in_body = true;
        Ok(())
    }

    fn step(&mut self, bytes: &[u8], read: &mut usize) -> Result<bool> {
        if !self.in_body {
            let (taken, done) = consume_child("Primitive read state", &mut self.length, bytes)?;
            *read += taken;
            if !done {
                return Ok(false);
            }
            self.length.finalize()?;
            self.enter_body()?;
        }
        let (taken, done) = consume_child(
            "Fixed length opaque read state",
            &mut self.body,
            &bytes[*read..],
        )?;
        *read += taken;
        Ok(done)
    }
}

impl ReadState for VariableLengthOpaqueReadState {
    fn consume(&mut self, bytes: &[u8]) -> (usize, bool) {
        if self.first_error.is_some() {
            return (0, true);
        }
        let mut read = 0;
        match self.step(bytes, &mut read) {
            Ok(done) => (read, done),
            Err(err) => {
                self.fail(err);
                (read, true)
            }
        }
    }

    fn finalize(&mut self) -> Result<()> {
        if let Some(err) = &self.first_error {
            return Err(err.clone());
        }
        let result = if self.in_body {
            self.body.finalize()
        } else {
            // Nothing of the body arrived: it is only complete if empty.
            self.length
                .finalize()
                .and_then(|()| self.enter_body())
                .and_then(|()| self.body.finalize())
        };
        result.map_err(|err| self.fail(err))
    }

    fn reset(&mut self) {
        self.length.reset();
        self.body.reset();
        self.in_body = false;
        self.first_error = None;
    }
}

impl fmt::Debug for VariableLengthOpaqueReadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableLengthOpaqueReadState")
            .field("length", &self.length)
            .field("body", &self.body)
            .field("max_length", &self.max_length)
            .field("in_body", &self.in_body)
            .field("first_error", &self.first_error)
            .finish()
    }
}
