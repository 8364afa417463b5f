//! Ready-made leaf readers that hand decoded data back to the caller.
//!
//! Read states are owned by their parents, so results are delivered through
//! shared buffers (`Rc<RefCell<_>>`) that the caller keeps a clone of.

use super::{DecodeState, PrimitiveReadState, ReadState, ReadStateFactory};
use crate::error::{Error, Result};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub type Shared<T> = Rc<RefCell<T>>;

/// Boxes a closure into a [`ReadStateFactory`].
pub fn factory<F>(f: F) -> ReadStateFactory
where
    F: FnMut(u32, u32) -> Result<Option<DecodeState>> + 'static,
{
    Box::new(f)
}

/// Byte sink for opaque readers: appends every payload byte to a shared
/// buffer.
///
/// Clones share the buffer, so one sink can collect the payloads of several
/// opaque fields in stream order.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    buffer: Shared<Vec<u8>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer(buffer: Shared<Vec<u8>>) -> Self {
        BufferSink { buffer }
    }

    pub fn buffer(&self) -> Shared<Vec<u8>> {
        Rc::clone(&self.buffer)
    }

    /// Takes the collected bytes, leaving the buffer empty.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.buffer.borrow_mut())
    }
}

impl ReadState for BufferSink {
    /// Takes everything; the owning opaque reader decides where the payload
    /// ends.
    fn consume(&mut self, bytes: &[u8]) -> (usize, bool) {
        self.buffer.borrow_mut().extend_from_slice(bytes);
        (bytes.len(), false)
    }

    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) {
        self.buffer.borrow_mut().clear();
    }
}

impl From<BufferSink> for DecodeState {
    fn from(sink: BufferSink) -> Self {
        DecodeState::custom(sink)
    }
}

type Callback = Box<dyn FnMut(&PrimitiveReadState) -> Result<()>>;

/// A primitive reader that runs a callback once its word is complete.
///
/// The callback runs from `finalize`, which array and union readers call as
/// soon as the element is filled, so values arrive in stream order.
pub struct PrimitiveHandler {
    primitive: PrimitiveReadState,
    on_complete: Callback,
    delivered: bool,
    first_error: Option<Error>,
}

impl PrimitiveHandler {
    pub fn new<F>(primitive: PrimitiveReadState, on_complete: F) -> Self
    where
        F: FnMut(&PrimitiveReadState) -> Result<()> + 'static,
    {
        PrimitiveHandler {
            primitive,
            on_complete: Box::new(on_complete),
            delivered: false,
            first_error: None,
        }
    }

    pub fn primitive(&self) -> &PrimitiveReadState {
        &self.primitive
    }
}

impl ReadState for PrimitiveHandler {
    fn consume(&mut self, bytes: &[u8]) -> (usize, bool) {
        if self.first_error.is_some() {
            return (0, true);
        }
        self.primitive.consume(bytes)
    }

    fn finalize(&mut self) -> Result<()> {
        if let Some(err) = &self.first_error {
            return Err(err.clone());
        }
        if self.delivered {
            return Ok(());
        }
        let result = self
            .primitive
            .finalize()
            .and_then(|()| (self.on_complete)(&self.primitive));
        if let Err(err) = &result {
            self.first_error = Some(err.clone());
        }
        self.delivered = true;
        result
    }

    fn reset(&mut self) {
        self.primitive.reset();
        self.delivered = false;
        self.first_error = None;
    }
}

impl fmt::Debug for PrimitiveHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveHandler")
            .field("primitive", &self.primitive)
            .field("delivered", &self.delivered)
            .field("first_error", &self.first_error)
            .finish_non_exhaustive()
    }
}

impl From<PrimitiveHandler> for DecodeState {
    fn from(handler: PrimitiveHandler) -> Self {
        DecodeState::custom(handler)
    }
}

macro_rules! collector {
    ($(#[$doc:meta])* $name:ident, $ty:ty, $ctor:ident, $accessor:ident) => {
        $(#[$doc])*
        pub fn $name(target: Shared<Vec<$ty>>) -> DecodeState {
            PrimitiveHandler::new(PrimitiveReadState::$ctor(), move |p| {
                target.borrow_mut().push(p.$accessor()?);
                Ok(())
            })
            .into()
        }
    };
}

collector!(
    /// Pushes each decoded `unsigned int` onto `target`.
    collect_uint, u32, word, as_uint
);
collector!(
    /// Pushes each decoded `int` onto `target`.
    collect_int, i32, word, as_int
);
collector!(
    /// Pushes each decoded `unsigned hyper` onto `target`.
    collect_hyper_uint, u64, hyper, as_hyper_uint
);
collector!(
    /// Pushes each decoded `hyper` onto `target`.
    collect_hyper_int, i64, hyper, as_hyper_int
);
collector!(
    /// Pushes each decoded `float` onto `target`.
    collect_float, f32, word, as_float
);
collector!(
    /// Pushes each decoded `double` onto `target`.
    collect_double, f64, hyper, as_double
);
