//! Non-moving buffers: byte snapshots pinned for native code
//!
//! Native code often wants a plain `const char*` to an object's bytes. The
//! managed heap may move the object, so the manager copies the bytes into a
//! heap allocation that never moves and hands out a pointer to it. The copy is
//! owned by a [`NonMovingBuffer`] release callback attached to the handle and
//! freed when the handle is closed.

use crate::callback::ReleaseCallback;
use crate::error::ReleaseError;
use crate::handle::Handle;
use std::ptr::NonNull;

/// Pinned copy of an object's bytes, freed on release.
pub struct NonMovingBuffer {
    data: Box<[u8]>,
}

impl NonMovingBuffer {
    /// Copy `bytes` into a pinned buffer with a trailing NUL
    pub fn new(bytes: &[u8]) -> Self {
        let mut data = Vec::with_capacity(bytes.len() + 1);
        data.extend_from_slice(bytes);
        data.push(0);
        Self {
            data: data.into_boxed_slice(),
        }
    }

    /// View of the pinned bytes (excluding the trailing NUL)
    pub fn view(&self) -> BufferView {
        BufferView {
            ptr: NonNull::from(&self.data[0]),
            len: self.data.len() - 1,
        }
    }
}

impl<T> ReleaseCallback<T> for NonMovingBuffer {
    fn release(self: Box<Self>, handle: Handle, _object: &T) -> Result<(), ReleaseError> {
        tracing::trace!(%handle, len = self.data.len() - 1, "freeing non-moving buffer");
        drop(self);
        Ok(())
    }
}

/// Raw view of a [`NonMovingBuffer`].
///
/// The pointer stays valid, and the bytes stay unchanged, until the handle
/// the buffer was pinned for is closed. `ptr[len]` is always a NUL byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferView {
    ptr: NonNull<u8>,
    len: usize,
}

impl BufferView {
    /// Pointer to the first byte
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Number of bytes, not counting the trailing NUL
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the view is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Borrow the bytes.
    ///
    /// # Safety
    ///
    /// The handle the buffer was pinned for must still be live.
    pub unsafe fn as_slice<'a>(&self) -> &'a [u8] {
        std::slice::from_raw_parts(self.ptr.as_ptr(), self.len)
    }
}
