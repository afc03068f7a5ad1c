//! Handle: the integer token native code holds instead of an object address
//!
//! A handle is an index into a [`HandleManager`](crate::HandleManager)'s slot
//! table. It has native pointer width and is signed so that the C side can
//! use `intptr_t` for it; only strictly positive values can ever be live.

use std::fmt;

/// Opaque integer handle to a managed object.
///
/// Handles are plain `Copy` tokens: copying one does not create a new
/// reference. Use [`HandleManager::dup`](crate::HandleManager::dup) for an
/// independent alias.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Handle(isize);

impl Handle {
    /// The permanent null handle (index 0). Never allocated, closed or freed.
    pub const NULL: Handle = Handle(0);

    /// Create a handle from its raw ABI value
    #[inline(always)]
    pub const fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    /// Get the raw ABI value
    #[inline(always)]
    pub const fn to_raw(self) -> isize {
        self.0
    }

    /// Check if this is the null handle
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Slot index for this handle, or `None` if the value is negative
    #[inline]
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }

    pub(crate) fn from_index(index: usize) -> Option<Self> {
        isize::try_from(index).ok().map(Self)
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<Handle> for isize {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}
