//! Discriminated unions: `union switch (int tag) { case ...: ... }`.

use super::{DecodeState, PrimitiveReadState, ReadState, ReadStateFactory, consume_child};
use crate::error::{Error, Result};
use std::fmt;
use tracing::{debug, trace};

/// Reads a 4-byte discriminant, asks the factory for the matching arm, then
/// hands every following byte to that arm.
pub struct TaggedUnionReadState {
    discriminant: PrimitiveReadState,
    factory: ReadStateFactory,
    handler_name: String,
    arm: Option<Box<DecodeState>>,
    first_error: Option<Error>,
}

impl TaggedUnionReadState {
    /// `factory` is called as `(discriminant, 0)` and returns `Ok(None)` for
    /// an unknown discriminant.
    pub fn new(factory: ReadStateFactory) -> Self {
        TaggedUnionReadState {
            discriminant: PrimitiveReadState::word(),
            factory,
            handler_name: String::new(),
            arm: None,
            first_error: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.handler_name = name.into();
        self
    }

    /// The discriminant, once all four bytes have arrived. Signed
    /// discriminants are the same bits read through `as i32`.
    pub fn discriminant(&self) -> Option<u32> {
        self.discriminant.as_uint().ok()
    }

    /// The selected arm, once the discriminant has been dispatched.
    pub fn arm(&self) -> Option<&DecodeState> {
        self.arm.as_deref()
    }

    fn fail(&mut self, err: Error) -> Error {
        debug!(handler = %self.handler_name, error = %err, "tagged union read failed");
        self.first_error = Some(err.clone());
        err
    }

    fn enter_arm(&mut self) -> Result<()> {
        let discriminant = self.discriminant.as_uint()?;
        match (self.factory)(discriminant, 0)? {
            Some(arm) => {
                trace!(handler = %self.handler_name, discriminant, "union arm entered");
                self.arm = Some(Box::new(arm));
                Ok(())
            }
            None => Err(Error::UnrecognizedDiscriminant {
                discriminant,
                name: self.handler_name.clone(),
            }),
        }
    }

    fn step(&mut self, bytes: &[u8], read: &mut usize) -> Result<bool> {
        if self.arm.is_none() {
            let (taken, done) = consume_child("Primitive read state", &mut self.discriminant, bytes)?;
            *read += taken;
            if !done {
                return Ok(false);
            }
            self.discriminant.finalize()?;
            self.enter_arm()?;
        }
        let Some(arm) = self.arm.as_mut() else {
            return Ok(true);
        };
        let (taken, done) = consume_child("Tagged union arm read state", arm.as_mut(), &bytes[*read..])?;
        *read += taken;
        Ok(done)
    }
}

impl ReadState for TaggedUnionReadState {
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
        let result = match self.arm.as_mut() {
            Some(arm) => arm.finalize(),
            // The packet ended before the arm saw a byte: fine for void arms.
            None => self
                .discriminant
                .finalize()
                .and_then(|()| self.enter_arm())
                .and_then(|()| match self.arm.as_mut() {
                    Some(arm) => arm.finalize(),
                    None => Ok(()),
                }),
        };
        result.map_err(|err| self.fail(err))
    }

    fn reset(&mut self) {
        self.discriminant.reset();
        self.arm = None;
        self.first_error = None;
    }
}

impl fmt::Debug for TaggedUnionReadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedUnionReadState")
            .field("discriminant", &self.discriminant)
            .field("handler_name", &self.handler_name)
            .field("arm", &self.arm)
            .field("first_error", &self.first_error)
            .finish_non_exhaustive()
    }
}
