//! HandleManager: the public handle API
//!
//! One manager belongs to one interpreter context and is passed around
//! explicitly. It is not `Sync` in spirit: every operation assumes the caller
//! holds that context's single thread of control.
//!
//! # Example
//!
//! ```ignore
//! let mut handles = HandleManager::new(&space);
//! let h = handles.new_handle(obj)?;
//! let alias = handles.dup(h)?;
//! handles.close(h)?;
//! let obj = handles.consume(alias)?;
//! ```

use crate::buffer::{BufferView, NonMovingBuffer};
use crate::callback::{run_release_callbacks, ReleaseCallback};
use crate::constants::{validate_constants, ConstantDef, ConstantSet, DEFAULT_CONSTANTS};
use crate::error::{HandleError, HandleResult, ReleaseError};
use crate::handle::Handle;
use crate::options::HandleOptions;
use crate::space::ObjectSpace;
use crate::table::{HandleTable, Vacated};

/// Usage counters for a [`HandleManager`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleStats {
    /// Number of constant slots, null included
    pub constants: usize,
    /// Live handles (constants included, null excluded)
    pub live: usize,
    /// Indices waiting on the free list
    pub free: usize,
    /// Slots ever created
    pub capacity: usize,
    /// Handles returned by `new_handle`/`dup`
    pub total_opened: u64,
    /// Handles released by `close`/`consume`
    pub total_closed: u64,
    /// Highest number of simultaneously live dynamic handles
    pub peak_live: usize,
}

/// Table of handles for one interpreter context.
pub struct HandleManager<T> {
    table: HandleTable<T>,
    constants: ConstantSet,
    options: HandleOptions,
    // per constant index: still holding its original object
    constant_live: Vec<bool>,
    live_constants: usize,
    live_dynamic: usize,
    peak_live: usize,
    total_opened: u64,
    total_closed: u64,
}

impl<T> HandleManager<T> {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Create a manager with the standard constants and default options
    pub fn new<S>(space: &S) -> Self
    where
        S: ObjectSpace<Object = T>,
    {
        Self::with_options(space, HandleOptions::default())
    }

    /// Create a manager with the standard constants
    pub fn with_options<S>(space: &S, options: HandleOptions) -> Self
    where
        S: ObjectSpace<Object = T>,
    {
        Self::install(space, DEFAULT_CONSTANTS, options)
    }

    /// Create a manager with a custom constant table.
    ///
    /// Entry 0 must be the null sentinel (no object) and every other entry
    /// must produce an object.
    pub fn with_constants<S>(
        space: &S,
        constants: &[ConstantDef],
        options: HandleOptions,
    ) -> HandleResult<Self>
    where
        S: ObjectSpace<Object = T>,
    {
        validate_constants(constants)?;
        Ok(Self::install(space, constants, options))
    }

    fn install<S>(space: &S, constants: &[ConstantDef], options: HandleOptions) -> Self
    where
        S: ObjectSpace<Object = T>,
    {
        let capacity = options.initial_capacity.max(constants.len());
        let mut table = HandleTable::with_capacity(capacity, options.max_handles);

        let mut constant_live = Vec::with_capacity(constants.len());
        for def in constants {
            let object = def.value.map(|which| space.singleton(which));
            constant_live.push(object.is_some());
            table.push_reserved(object);
        }
        let live_constants = constant_live.iter().filter(|live| **live).count();
        tracing::debug!(
            count = constants.len(),
            protected = options.protect_constants,
            "installed constant handles"
        );

        Self {
            table,
            constants: ConstantSet::new(constants),
            options,
            constant_live,
            live_constants,
            live_dynamic: 0,
            peak_live: 0,
            total_opened: 0,
            total_closed: 0,
        }
    }

    // ========================================================================
    // Core Operations
    // ========================================================================

    /// Store an owned object reference and return a new handle for it.
    ///
    /// Reuses the most recently freed index if there is one.
    pub fn new_handle(&mut self, object: T) -> HandleResult<Handle> {
        let handle = self.table.insert(object)?;
        self.live_dynamic += 1;
        self.peak_live = self.peak_live.max(self.live_dynamic);
        self.total_opened += 1;
        tracing::trace!(%handle, "new handle");
        Ok(handle)
    }

    /// Borrow the object behind a live handle
    #[inline]
    pub fn deref(&self, handle: Handle) -> HandleResult<&T> {
        self.table.get(handle)
    }

    /// Close a handle.
    ///
    /// Attached release callbacks run first, in attachment order, each
    /// exactly once. The object reference is then dropped and the index
    /// becomes reusable. If a callback fails the handle is still closed and
    /// the first failure is returned.
    pub fn close(&mut self, handle: Handle) -> HandleResult<()> {
        let vacated = self.vacate(handle)?;
        let result = run_release_callbacks(handle, &vacated.object, vacated.callbacks);
        drop(vacated.object);
        self.finish_close(handle);
        result
    }

    /// Close a handle and return the object it referred to.
    ///
    /// Used when the caller takes ownership of the value and gives up the
    /// handle in one step. On callback failure the handle is closed and the
    /// object dropped, as in [`Self::close`].
    pub fn consume(&mut self, handle: Handle) -> HandleResult<T> {
        let vacated = self.vacate(handle)?;
        let result = run_release_callbacks(handle, &vacated.object, vacated.callbacks);
        self.finish_close(handle);
        result.map(|()| vacated.object)
    }

    /// Create an independent alias of a live handle.
    ///
    /// The alias has its own lifetime and an empty callback list.
    pub fn dup(&mut self, handle: Handle) -> HandleResult<Handle>
    where
        T: Clone,
    {
        let object = self.deref(handle)?.clone();
        let alias = self.new_handle(object)?;
        tracing::trace!(%handle, %alias, "dup handle");
        Ok(alias)
    }

    /// Attach a release callback to a live handle
    pub fn attach_release_callback<C>(&mut self, handle: Handle, callback: C) -> HandleResult<()>
    where
        C: ReleaseCallback<T> + 'static,
    {
        self.check_mutable(handle)?;
        self.table.attach(handle, Box::new(callback))
    }

    /// Attach a closure as a release callback
    pub fn attach_release_fn<F>(&mut self, handle: Handle, release: F) -> HandleResult<()>
    where
        F: FnOnce(Handle, &T) -> Result<(), ReleaseError> + 'static,
    {
        self.attach_release_callback(handle, release)
    }

    /// Pin a copy of `bytes` for the lifetime of `handle`.
    ///
    /// The returned view stays valid until the handle is closed.
    pub fn pin_bytes(&mut self, handle: Handle, bytes: &[u8]) -> HandleResult<BufferView> {
        let buffer = NonMovingBuffer::new(bytes);
        let view = buffer.view();
        self.attach_release_callback(handle, buffer)?;
        Ok(view)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Check if a handle is currently live
    pub fn is_live(&self, handle: Handle) -> bool {
        self.table.is_live(handle)
    }

    /// Check if a handle is in the constant range
    pub fn is_constant(&self, handle: Handle) -> bool {
        self.constants.contains(handle)
    }

    /// Look up a constant handle by name
    pub fn constant(&self, name: &str) -> Option<Handle> {
        self.constants.handle(name)
    }

    /// Installed constants
    pub fn constants(&self) -> &ConstantSet {
        &self.constants
    }

    /// Options this manager was built with
    pub fn options(&self) -> &HandleOptions {
        &self.options
    }

    /// Number of release callbacks attached to a live handle
    pub fn attached_callbacks(&self, handle: Handle) -> HandleResult<usize> {
        self.table.callback_count(handle)
    }

    /// Number of live dynamic handles
    pub fn live_count(&self) -> usize {
        self.live_dynamic
    }

    /// Usage counters
    pub fn stats(&self) -> HandleStats {
        HandleStats {
            constants: self.constants.len(),
            live: self.live_constants + self.live_dynamic,
            free: self.table.free_count(),
            capacity: self.table.capacity(),
            total_opened: self.total_opened,
            total_closed: self.total_closed,
            peak_live: self.peak_live,
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn check_mutable(&self, handle: Handle) -> HandleResult<()> {
        if self.options.protect_constants {
            if let Some(name) = self.constants.name_of(handle) {
                if !handle.is_null() {
                    return Err(HandleError::Constant { handle, name });
                }
            }
        }
        Ok(())
    }

    fn vacate(&mut self, handle: Handle) -> HandleResult<Vacated<T>> {
        self.check_mutable(handle)?;
        self.table.vacate(handle)
    }

    fn finish_close(&mut self, handle: Handle) {
        let was_constant = handle
            .index()
            .and_then(|index| self.constant_live.get_mut(index))
            .map(|live| std::mem::replace(live, false))
            .unwrap_or(false);
        if was_constant {
            self.live_constants -= 1;
        } else {
            self.live_dynamic -= 1;
        }
        self.total_closed += 1;
        self.table.recycle(handle);
        tracing::trace!(%handle, "closed handle");
    }
}

impl<T> std::fmt::Debug for HandleManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleManager")
            .field("stats", &self.stats())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::well_known;
    use crate::space::Singleton;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Obj {
        Singleton(Singleton),
        Int(i64),
        Str(&'static str),
    }

    struct Space;

    impl ObjectSpace for Space {
        type Object = Obj;

        fn singleton(&self, which: Singleton) -> Obj {
            Obj::Singleton(which)
        }
    }

    fn manager() -> HandleManager<Obj> {
        HandleManager::new(&Space)
    }

    #[test]
    fn test_constants_installed_first() {
        let mut handles = manager();
        assert_eq!(
            *handles.deref(well_known::TRUE).unwrap(),
            Obj::Singleton(Singleton::True)
        );
        assert_eq!(
            *handles.deref(well_known::LIST_TYPE).unwrap(),
            Obj::Singleton(Singleton::ListType)
        );

        let h = handles.new_handle(Obj::Int(1)).unwrap();
        assert_eq!(h.to_raw(), DEFAULT_CONSTANTS.len() as isize);
    }

    #[test]
    fn test_new_then_deref() {
        let mut handles = manager();
        let h = handles.new_handle(Obj::Str("x")).unwrap();
        assert_eq!(*handles.deref(h).unwrap(), Obj::Str("x"));
    }

    #[test]
    fn test_null_is_never_derefable() {
        let handles = manager();
        assert!(matches!(handles.deref(Handle::NULL), Err(HandleError::Null)));
    }

    #[test]
    fn test_close_then_deref_is_not_live() {
        let mut handles = manager();
        let h = handles.new_handle(Obj::Int(5)).unwrap();
        handles.close(h).unwrap();
        assert!(matches!(handles.deref(h), Err(HandleError::NotLive(_))));
        assert!(matches!(handles.close(h), Err(HandleError::NotLive(_))));
    }

    #[test]
    fn test_consume_returns_object_and_frees_index() {
        let mut handles = manager();
        let h = handles.new_handle(Obj::Int(9)).unwrap();
        assert_eq!(handles.consume(h).unwrap(), Obj::Int(9));
        assert!(!handles.is_live(h));
        assert_eq!(handles.new_handle(Obj::Int(10)).unwrap(), h);
    }

    #[test]
    fn test_dup_is_independent() {
        let mut handles = manager();
        let h = handles.new_handle(Obj::Str("shared")).unwrap();
        let alias = handles.dup(h).unwrap();
        assert_ne!(h, alias);
        assert_eq!(handles.deref(h).unwrap(), handles.deref(alias).unwrap());

        handles.close(alias).unwrap();
        assert_eq!(*handles.deref(h).unwrap(), Obj::Str("shared"));
    }

    #[test]
    fn test_dup_does_not_copy_callbacks() {
        let mut handles = manager();
        let fired = Rc::new(RefCell::new(0));
        let h = handles.new_handle(Obj::Int(1)).unwrap();
        let counter = Rc::clone(&fired);
        handles
            .attach_release_fn(h, move |_: Handle, _: &Obj| {
                *counter.borrow_mut() += 1;
                Ok(())
            })
            .unwrap();

        let alias = handles.dup(h).unwrap();
        assert_eq!(handles.attached_callbacks(alias).unwrap(), 0);

        handles.close(alias).unwrap();
        assert_eq!(*fired.borrow(), 0);
        handles.close(h).unwrap();
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn test_protected_constants() {
        let mut handles = manager();
        let err = handles.close(well_known::NONE).unwrap_err();
        assert!(matches!(err, HandleError::Constant { name: "None", .. }));
        assert!(matches!(
            handles.consume(well_known::TRUE),
            Err(HandleError::Constant { name: "True", .. })
        ));
        assert!(matches!(
            handles.attach_release_fn(well_known::FALSE, |_: Handle, _: &Obj| Ok(())),
            Err(HandleError::Constant { name: "False", .. })
        ));
        assert!(handles.is_live(well_known::NONE));
    }

    #[test]
    fn test_null_close_is_rejected() {
        let mut handles = manager();
        assert!(matches!(handles.close(Handle::NULL), Err(HandleError::Null)));
    }

    #[test]
    fn test_unprotected_constant_can_be_closed_and_reused() {
        let options = HandleOptions::default().with_constant_protection(false);
        let mut handles = HandleManager::with_options(&Space, options);

        handles.close(well_known::NONE).unwrap();
        assert!(!handles.is_live(well_known::NONE));
        let h = handles.new_handle(Obj::Int(3)).unwrap();
        assert_eq!(h, well_known::NONE);
        assert_eq!(*handles.deref(h).unwrap(), Obj::Int(3));
        assert_eq!(handles.live_count(), 1);

        handles.close(h).unwrap();
        assert_eq!(handles.live_count(), 0);
        assert_eq!(handles.stats().live, 10);
    }

    #[test]
    fn test_with_constants_validates() {
        let bad = [ConstantDef::new("True", Some(Singleton::True))];
        assert!(matches!(
            HandleManager::with_constants(&Space, &bad, HandleOptions::default()),
            Err(HandleError::InvalidConstantTable(_))
        ));
    }

    #[test]
    fn test_exhausted() {
        let options = HandleOptions::default().with_max_handles(DEFAULT_CONSTANTS.len() + 1);
        let mut handles = HandleManager::with_options(&Space, options);
        let h = handles.new_handle(Obj::Int(1)).unwrap();
        assert!(matches!(
            handles.new_handle(Obj::Int(2)),
            Err(HandleError::Exhausted { .. })
        ));
        handles.close(h).unwrap();
        assert!(handles.new_handle(Obj::Int(3)).is_ok());
    }

    #[test]
    fn test_pin_bytes_released_on_close() {
        let mut handles = manager();
        let h = handles.new_handle(Obj::Str("bytes")).unwrap();
        let view = handles.pin_bytes(h, b"bytes").unwrap();
        unsafe {
            assert_eq!(view.as_slice(), b"bytes");
        }
        assert_eq!(handles.attached_callbacks(h).unwrap(), 1);
        handles.close(h).unwrap();
    }

    #[test]
    fn test_stats() {
        let mut handles = manager();
        let a = handles.new_handle(Obj::Int(1)).unwrap();
        let b = handles.new_handle(Obj::Int(2)).unwrap();
        handles.close(a).unwrap();

        let stats = handles.stats();
        assert_eq!(stats.constants, 12);
        assert_eq!(stats.live, 11 + 1);
        assert_eq!(stats.free, 1);
        assert_eq!(stats.capacity, 14);
        assert_eq!(stats.total_opened, 2);
        assert_eq!(stats.total_closed, 1);
        assert_eq!(stats.peak_live, 2);
        assert_eq!(handles.live_count(), 1);

        handles.close(b).unwrap();
        assert_eq!(handles.live_count(), 0);
    }
}
