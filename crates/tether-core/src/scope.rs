//! Scoped handles: transient handles closed on every exit path
//!
//! Native shims frequently need a handle only for the duration of one call.
//! [`ScopedHandle`] opens the handle on construction and closes it when the
//! guard goes out of scope, whether the work returned normally, bailed out
//! early with `?`, or unwound.

use crate::error::HandleResult;
use crate::handle::Handle;
use crate::manager::HandleManager;

/// Guard owning one transient handle.
///
/// The guard dereferences to the manager, so the enclosed work keeps using
/// the manager through it. The guarded handle itself must not be closed or
/// consumed through that access: the guard closes it again on drop, which
/// panics with `NotLive` or, once the index is reused, closes an unrelated
/// handle. [`ScopedHandle::into_handle`] is the only way to give it up early;
/// close or consume the returned handle afterwards.
pub struct ScopedHandle<'m, T> {
    manager: &'m mut HandleManager<T>,
    handle: Handle,
    armed: bool,
}

impl<'m, T> ScopedHandle<'m, T> {
    pub(crate) fn open(manager: &'m mut HandleManager<T>, object: T) -> HandleResult<Self> {
        let handle = manager.new_handle(object)?;
        Ok(Self {
            manager,
            handle,
            armed: true,
        })
    }

    /// The guarded handle
    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Borrow the guarded object
    pub fn object(&self) -> HandleResult<&T> {
        self.manager.deref(self.handle)
    }

    /// Close the handle now and report the outcome
    pub fn close(mut self) -> HandleResult<()> {
        self.armed = false;
        self.manager.close(self.handle)
    }

    /// Stop guarding and hand the still-open handle to the caller
    pub fn into_handle(mut self) -> Handle {
        self.armed = false;
        self.handle
    }
}

impl<'m, T> std::ops::Deref for ScopedHandle<'m, T> {
    type Target = HandleManager<T>;

    fn deref(&self) -> &HandleManager<T> {
        &*self.manager
    }
}

impl<'m, T> std::ops::DerefMut for ScopedHandle<'m, T> {
    fn deref_mut(&mut self) -> &mut HandleManager<T> {
        &mut *self.manager
    }
}

impl<'m, T> Drop for ScopedHandle<'m, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;

        if let Err(err) = self.manager.close(self.handle) {
            if std::thread::panicking() {
                tracing::error!(handle = %self.handle, error = %err, "failed to close scoped handle while unwinding");
            } else {
                panic!("failed to close scoped handle {}: {}", self.handle, err);
            }
        }
    }
}

impl<T> HandleManager<T> {
    /// Open a handle that is closed when the returned guard drops
    pub fn scope(&mut self, object: T) -> HandleResult<ScopedHandle<'_, T>> {
        ScopedHandle::open(self, object)
    }

    /// Run `work` with a transient handle to `object`.
    ///
    /// The handle is closed after `work` returns, or while unwinding if it
    /// panics.
    pub fn using<R, F>(&mut self, object: T, work: F) -> HandleResult<R>
    where
        F: FnOnce(&mut HandleManager<T>, Handle) -> R,
    {
        let mut scope = self.scope(object)?;
        let handle = scope.handle();
        let result = work(&mut scope, handle);
        scope.close()?;
        Ok(result)
    }
}
