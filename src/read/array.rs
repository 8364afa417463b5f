//! Arrays: `type name[n]` and `type name<max>`.

use super::{PrimitiveReadState, ReadState, ReadStateFactory, consume_child};
use crate::error::{Error, Result};
use std::fmt;
use tracing::{debug, trace};

/// Reads exactly `expected_length` elements, one child reader at a time.
///
/// The child for index `i` is requested from the factory only when index `i`
/// becomes current, and is finalized as soon as it reports completion.
pub struct FixedLengthArrayReadState {
    expected_length: u32,
    factory: ReadStateFactory,
    handler_name: String,
    current_index: u32,
    current: Option<Box<super::DecodeState>>,
    first_error: Option<Error>,
}

impl FixedLengthArrayReadState {
    pub fn new(expected_length: u32, factory: ReadStateFactory) -> Self {
        FixedLengthArrayReadState {
            expected_length,
            factory,
            handler_name: String::new(),
            current_index: 0,
            current: None,
            first_error: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.handler_name = name.into();
        self
    }

    pub fn expected_length(&self) -> u32 {
        self.expected_length
    }

    /// Index of the element currently being decoded (or the element count
    /// once the array is complete).
    pub fn current_index(&self) -> u32 {
        self.current_index
    }

    /// Resets and expects `expected_length` elements from now on.
    pub fn reset_length(&mut self, expected_length: u32) {
        self.reset();
        self.expected_length = expected_length;
    }

    fn element_error(&self, err: Error) -> Error {
        Error::Element {
            index: self.current_index,
            count: self.expected_length,
            source: Box::new(err),
        }
    }

    fn fail(&mut self, err: Error) -> Error {
        debug!(
            handler = %self.handler_name,
            index = self.current_index,
            count = self.expected_length,
            error = %err,
            "array read failed"
        );
        self.current = None;
        self.first_error = Some(err.clone());
        err
    }

    /// Builds the child for the current index.
    fn next_handler(&mut self) -> Result<()> {
        let index = self.current_index;
        let count = self.expected_length;
        match (self.factory)(index, count) {
            Ok(Some(child)) => {
                trace!(handler = %self.handler_name, index, count, "array element entered");
                self.current = Some(Box::new(child));
                Ok(())
            }
            Ok(None) => Err(Error::MissingHandler { index, count }),
            Err(err) => Err(self.element_error(err)),
        }
    }

    /// Finalizes the current child and moves on. Returns `true` once the
    /// last element is done.
    fn advance(&mut self) -> Result<bool> {
        if let Some(child) = self.current.as_mut() {
            if let Err(err) = child.finalize() {
                return Err(self.element_error(err));
            }
        }
        self.current_index += 1;
        if self.current_index < self.expected_length {
            self.next_handler()?;
            Ok(false)
        } else {
            self.current = None;
            Ok(true)
        }
    }

    fn step(&mut self, bytes: &[u8], read: &mut usize) -> Result<bool> {
        if self.current_index >= self.expected_length {
            return Ok(true);
        }
        if self.current.is_none() {
            self.next_handler()?;
        }
        loop {
            let Some(child) = self.current.as_mut() else {
                return Ok(true);
            };
            let (taken, done) = consume_child("Array element read state", child.as_mut(), &bytes[*read..])?;
            *read += taken;
            if !done {
                return Ok(false);
            }
            // Keep going even on an empty remainder: void elements need no input.
            if self.advance()? {
                return Ok(true);
            }
        }
    }

    fn drain(&mut self) -> Result<()> {
        if self.current_index >= self.expected_length {
            return Ok(());
        }
        if self.current.is_none() {
            self.next_handler()?;
        }
        while !self.advance()? {}
        Ok(())
    }
}

impl ReadState for FixedLengthArrayReadState {
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

    /// Finalizes the remaining elements in order, so a truncated array
    /// reports the first element that is actually missing.
    fn finalize(&mut self) -> Result<()> {
        if let Some(err) = &self.first_error {
            return Err(err.clone());
        }
        self.drain().map_err(|err| self.fail(err))
    }

    fn reset(&mut self) {
        self.current_index = 0;
        self.current = None;
        self.first_error = None;
    }
}

impl fmt::Debug for FixedLengthArrayReadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedLengthArrayReadState")
            .field("expected_length", &self.expected_length)
            .field("handler_name", &self.handler_name)
            .field("current_index", &self.current_index)
            .field("current", &self.current)
            .field("first_error", &self.first_error)
            .finish_non_exhaustive()
    }
}

/// Reads a `uint32` element count, checks it against `max_length`, then reads
/// that many elements.
pub struct VariableLengthArrayReadState {
    length: PrimitiveReadState,
    body: FixedLengthArrayReadState,
    max_length: u32,
    in_body: bool,
    first_error: Option<Error>,
}

impl VariableLengthArrayReadState {
    pub fn new(max_length: u32, factory: ReadStateFactory) -> Self {
        VariableLengthArrayReadState {
            length: PrimitiveReadState::word(),
            body: FixedLengthArrayReadState::new(0, factory),
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

    /// The decoded element count, once it has fully arrived.
    pub fn length(&self) -> Option<u32> {
        self.length.as_uint().ok()
    }

    fn fail(&mut self, err: Error) -> Error {
        debug!(error = %err, "variable-length array read failed");
        self.first_error = Some(err.clone());
        err
    }

    fn enter_body(&mut self) -> Result<()> {
        let length = self.length.as_uint()?;
        if length > self.max_length {
            return Err(Error::MaxLengthExceeded {
                kind: "Variable-length array",
                max: self.max_length,
                got: length,
            });
        }
        trace!(length, max = self.max_length, "array length prefix decoded");
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
            "Fixed length array read state",
            &mut self.body,
            &bytes[*read..],
        )?;
        *read += taken;
        Ok(done)
    }
}

impl ReadState for VariableLengthArrayReadState {
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
            // No element arrived: only an empty array can be complete.
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

impl fmt::Debug for VariableLengthArrayReadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableLengthArrayReadState")
            .field("length", &self.length)
            .field("body", &self.body)
            .field("max_length", &self.max_length)
            .field("in_body", &self.in_body)
            .field("first_error", &self.first_error)
            .finish()
    }
}
