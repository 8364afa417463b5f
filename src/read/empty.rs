//! `void`: the reader for zero-length values.

use super::ReadState;
use crate::error::Result;

/// XDR `void`: zero bytes, complete before it starts.
///
/// Backs void union arms and zero-size array elements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyReadState;

impl ReadState for EmptyReadState {
    fn consume(&mut self, _bytes: &[u8]) -> (usize, bool) {
        (0, true)
    }

    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) {}
}
