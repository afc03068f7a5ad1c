//! Slot table backing the handle manager.
//!
//! Slots live in a growable vector; reclaimed indices go on a LIFO free list
//! and are reused before the vector grows. The table never shrinks.

use crate::callback::BoxedReleaseCallback;
use crate::error::{HandleError, HandleResult};
use crate::handle::Handle;

struct Slot<T> {
    object: Option<T>,
    callbacks: Option<Vec<BoxedReleaseCallback<T>>>,
}

impl<T> Slot<T> {
    fn empty() -> Self {
        Self {
            object: None,
            callbacks: None,
        }
    }
}

/// Contents of a slot that was just vacated
pub(crate) struct Vacated<T> {
    pub object: T,
    pub callbacks: Vec<BoxedReleaseCallback<T>>,
}

pub(crate) struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<usize>,
    max_slots: Option<usize>,
}

impl<T> HandleTable<T> {
    pub fn with_capacity(capacity: usize, max_slots: Option<usize>) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            max_slots,
        }
    }

    /// Append a slot at the next index without consulting the free list.
    ///
    /// Used for constants, which must occupy `0..n` before any dynamic
    /// allocation. `None` reserves the index with no object (the null slot).
    pub fn push_reserved(&mut self, object: Option<T>) -> Handle {
        let index = self.slots.len();
        self.slots.push(Slot {
            object,
            callbacks: None,
        });
        Handle::from_raw(index as isize)
    }

    pub fn insert(&mut self, object: T) -> HandleResult<Handle> {
        if let Some(index) = self.free_list.pop() {
            // callbacks were already cleared when the slot was vacated
            self.slots[index].object = Some(object);
            return Ok(Handle::from_raw(index as isize));
        }

        let index = self.slots.len();
        if let Some(limit) = self.max_slots {
            if index >= limit {
                return Err(HandleError::Exhausted { limit });
            }
        }
        let handle = Handle::from_index(index).ok_or(HandleError::Exhausted { limit: index })?;
        self.slots.push(Slot {
            object: Some(object),
            callbacks: None,
        });
        Ok(handle)
    }

    /// Validate a handle and return its slot index.
    ///
    /// Null and negative handles are rejected before the slot is looked at.
    pub fn check(&self, handle: Handle) -> HandleResult<usize> {
        let raw = handle.to_raw();
        if raw == 0 {
            return Err(HandleError::Null);
        }
        let index = handle.index().ok_or(HandleError::Negative(raw))?;
        match self.slots.get(index) {
            Some(slot) if slot.object.is_some() => Ok(index),
            Some(_) => Err(HandleError::NotLive(handle)),
            None => Err(HandleError::OutOfRange {
                handle,
                capacity: self.slots.len(),
            }),
        }
    }

    pub fn get(&self, handle: Handle) -> HandleResult<&T> {
        let index = self.check(handle)?;
        self.slots[index]
            .object
            .as_ref()
            .ok_or(HandleError::NotLive(handle))
    }

    pub fn attach(&mut self, handle: Handle, callback: BoxedReleaseCallback<T>) -> HandleResult<()> {
        let index = self.check(handle)?;
        self.slots[index]
            .callbacks
            .get_or_insert_with(Vec::new)
            .push(callback);
        Ok(())
    }

    /// Empty a live slot without making its index reusable yet.
    ///
    /// The caller runs the callbacks and then calls [`Self::recycle`].
    pub fn vacate(&mut self, handle: Handle) -> HandleResult<Vacated<T>> {
        let index = self.check(handle)?;
        let slot = std::mem::replace(&mut self.slots[index], Slot::empty());
        let object = slot.object.ok_or(HandleError::NotLive(handle))?;
        Ok(Vacated {
            object,
            callbacks: slot.callbacks.unwrap_or_default(),
        })
    }

    pub fn recycle(&mut self, handle: Handle) {
        if let Some(index) = handle.index() {
            debug_assert!(self.slots[index].object.is_none());
            self.free_list.push(index);
        }
    }

    pub fn is_live(&self, handle: Handle) -> bool {
        self.check(handle).is_ok()
    }

    pub fn callback_count(&self, handle: Handle) -> HandleResult<usize> {
        let index = self.check(handle)?;
        Ok(self.slots[index].callbacks.as_ref().map_or(0, Vec::len))
    }

    /// Number of slots ever created
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of indices waiting for reuse
    pub fn free_count(&self) -> usize {
        self.free_list.len()
    }
}
