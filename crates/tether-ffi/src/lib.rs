//! C ABI for Tether handle managers
//!
//! Native extension code sees an interpreter context as a [`NativeContext`]:
//! a plain C struct carrying the published constant handles and a table of
//! function pointers. The API follows these principles:
//! - ABI-stable (handles are pointer-sized signed integers)
//! - One context per interpreter, never shared between threads
//! - Contract violations abort the process; nothing unwinds into C

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::ptr;
use tether_core::{Handle, HandleError, HandleManager, HandleOptions, ObjectSpace};

/// Layout version of [`NativeContext`]
pub const ABI_VERSION: u32 = 1;

// ============================================================================
// Native Context
// ============================================================================

/// Context header handed to native code.
///
/// Always the first field of a [`ContextBridge`], so a pointer to it is also
/// a pointer to the bridge.
#[repr(C)]
pub struct NativeContext {
    /// Layout version, see [`ABI_VERSION`]
    pub abi_version: u32,

    /// `None`
    pub h_none: Handle,
    /// `False`
    pub h_false: Handle,
    /// `True`
    pub h_true: Handle,
    /// `ValueError`
    pub h_value_error: Handle,
    /// `TypeError`
    pub h_type_error: Handle,
    /// Root object type
    pub h_base_object_type: Handle,
    /// `type`
    pub h_type_type: Handle,
    /// Integer type
    pub h_long_type: Handle,
    /// Text string type
    pub h_unicode_type: Handle,
    /// Tuple type
    pub h_tuple_type: Handle,
    /// List type
    pub h_list_type: Handle,

    /// Close a handle
    pub ctx_close: unsafe extern "C" fn(ctx: *mut NativeContext, h: Handle),
    /// Return a new handle for the same object
    pub ctx_dup: unsafe extern "C" fn(ctx: *mut NativeContext, h: Handle) -> Handle,
    /// Nonzero if the handle is live
    pub ctx_is_live: unsafe extern "C" fn(ctx: *const NativeContext, h: Handle) -> c_int,
    /// Look up a constant by NUL-terminated name; NULL handle if unknown
    pub ctx_constant: unsafe extern "C" fn(ctx: *const NativeContext, name: *const c_char) -> Handle,
    /// Pin the bytes of a bytes-like object until the handle is closed
    pub ctx_bytes_as_ptr:
        unsafe extern "C" fn(ctx: *mut NativeContext, h: Handle, len_out: *mut usize) -> *const c_char,
}

/// Interpreter-side owner of a [`NativeContext`].
///
/// Boxed on construction so the header address handed to C stays fixed.
#[repr(C)]
pub struct ContextBridge<S: ObjectSpace> {
    native: NativeContext,
    space: S,
    manager: HandleManager<S::Object>,
}

impl<S: ObjectSpace> ContextBridge<S> {
    /// Build a context with default handle options
    pub fn new(space: S) -> Box<Self> {
        Self::with_options(space, HandleOptions::default())
    }

    /// Build a context
    pub fn with_options(space: S, options: HandleOptions) -> Box<Self> {
        let manager = HandleManager::with_options(&space, options);
        let lookup = |name: &str| manager.constant(name).unwrap_or(Handle::NULL);

        let native = NativeContext {
            abi_version: ABI_VERSION,
            h_none: lookup("None"),
            h_false: lookup("False"),
            h_true: lookup("True"),
            h_value_error: lookup("ValueError"),
            h_type_error: lookup("TypeError"),
            h_base_object_type: lookup("BaseObjectType"),
            h_type_type: lookup("TypeType"),
            h_long_type: lookup("LongType"),
            h_unicode_type: lookup("UnicodeType"),
            h_tuple_type: lookup("TupleType"),
            h_list_type: lookup("ListType"),
            ctx_close: ctx_close::<S>,
            ctx_dup: ctx_dup::<S>,
            ctx_is_live: ctx_is_live::<S>,
            ctx_constant: ctx_constant::<S>,
            ctx_bytes_as_ptr: ctx_bytes_as_ptr::<S>,
        };

        tracing::debug!(abi_version = ABI_VERSION, "created native context");
        Box::new(Self {
            native,
            space,
            manager,
        })
    }

    /// Pointer to pass to native code; valid while the bridge is alive
    pub fn as_native(&mut self) -> *mut NativeContext {
        // `native` is the first field of a #[repr(C)] struct; the pointer must
        // cover the whole bridge because the shims cast it back
        (self as *mut Self).cast::<NativeContext>()
    }

    /// The native header
    pub fn native(&self) -> &NativeContext {
        &self.native
    }

    /// The handle manager
    pub fn manager(&self) -> &HandleManager<S::Object> {
        &self.manager
    }

    /// The handle manager, mutably
    pub fn manager_mut(&mut self) -> &mut HandleManager<S::Object> {
        &mut self.manager
    }

    /// The object space
    pub fn space(&self) -> &S {
        &self.space
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Recover the bridge behind a context pointer
///
/// # Safety
/// `ctx` must come from [`ContextBridge::as_native`] on a live
/// `ContextBridge<S>` with the same `S`, and no other reference to that
/// bridge may be active.
unsafe fn bridge_mut<'a, S: ObjectSpace>(ctx: *mut NativeContext) -> &'a mut ContextBridge<S> {
    &mut *(ctx as *mut ContextBridge<S>)
}

/// Shared variant of [`bridge_mut`]
///
/// # Safety
/// Same as [`bridge_mut`], except shared references may coexist.
unsafe fn bridge_ref<'a, S: ObjectSpace>(ctx: *const NativeContext) -> &'a ContextBridge<S> {
    &*(ctx as *const ContextBridge<S>)
}

fn failure_kind(err: &HandleError) -> &'static str {
    if err.is_contract_violation() {
        "handle contract violated by native code"
    } else {
        "handle operation failed at native boundary"
    }
}

fn fatal(op: &'static str, err: HandleError) -> ! {
    tracing::error!(op, error = %err, "{}", failure_kind(&err));
    std::process::abort()
}

// ============================================================================
// Context Functions
// ============================================================================

unsafe extern "C" fn ctx_close<S: ObjectSpace>(ctx: *mut NativeContext, h: Handle) {
    let bridge = bridge_mut::<S>(ctx);
    if let Err(err) = bridge.manager.close(h) {
        fatal("close", err);
    }
}

unsafe extern "C" fn ctx_dup<S: ObjectSpace>(ctx: *mut NativeContext, h: Handle) -> Handle {
    let bridge = bridge_mut::<S>(ctx);
    match bridge.manager.dup(h) {
        Ok(alias) => alias,
        Err(err) => fatal("dup", err),
    }
}

unsafe extern "C" fn ctx_is_live<S: ObjectSpace>(ctx: *const NativeContext, h: Handle) -> c_int {
    let bridge = bridge_ref::<S>(ctx);
    bridge.manager.is_live(h) as c_int
}

unsafe extern "C" fn ctx_constant<S: ObjectSpace>(
    ctx: *const NativeContext,
    name: *const c_char,
) -> Handle {
    if name.is_null() {
        return Handle::NULL;
    }
    let bridge = bridge_ref::<S>(ctx);
    match CStr::from_ptr(name).to_str() {
        Ok(name) => bridge.manager.constant(name).unwrap_or(Handle::NULL),
        Err(_) => Handle::NULL,
    }
}

unsafe extern "C" fn ctx_bytes_as_ptr<S: ObjectSpace>(
    ctx: *mut NativeContext,
    h: Handle,
    len_out: *mut usize,
) -> *const c_char {
    let bridge = bridge_mut::<S>(ctx);
    let bytes = match bridge.manager.deref(h) {
        Ok(object) => bridge.space.bytes(object),
        Err(err) => fatal("bytes_as_ptr", err),
    };
    let Some(bytes) = bytes else {
        return ptr::null();
    };

    match bridge.manager.pin_bytes(h, &bytes) {
        Ok(view) => {
            if !len_out.is_null() {
                *len_out = view.len();
            }
            view.as_ptr() as *const c_char
        }
        Err(err) => fatal("bytes_as_ptr", err),
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Get the Tether version string
///
/// # Safety
/// - The returned string is static and must not be freed
#[no_mangle]
pub unsafe extern "C" fn tether_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::rc::Rc;
    use tether_core::Singleton;

    #[derive(Debug, PartialEq)]
    enum Value {
        Singleton(Singleton),
        Int(i64),
        Bytes(Vec<u8>),
    }

    struct Space;

    impl ObjectSpace for Space {
        type Object = Rc<Value>;

        fn singleton(&self, which: Singleton) -> Rc<Value> {
            Rc::new(Value::Singleton(which))
        }

        fn bytes(&self, object: &Rc<Value>) -> Option<Vec<u8>> {
            match object.as_ref() {
                Value::Bytes(data) => Some(data.clone()),
                _ => None,
            }
        }
    }

    #[test]
    fn test_header_publishes_constants() {
        let bridge = ContextBridge::new(Space);
        let native = bridge.native();

        assert_eq!(native.abi_version, ABI_VERSION);
        assert_eq!(native.h_none.to_raw(), 1);
        assert_eq!(native.h_true.to_raw(), 3);
        assert_eq!(native.h_list_type.to_raw(), 11);
        assert_eq!(
            **bridge.manager().deref(native.h_type_error).unwrap(),
            Value::Singleton(Singleton::TypeError)
        );
    }

    #[test]
    fn test_function_table_roundtrip() {
        let mut bridge = ContextBridge::new(Space);
        let h = bridge.manager_mut().new_handle(Rc::new(Value::Int(9))).unwrap();
        let ctx = bridge.as_native();

        unsafe {
            let alias = ((*ctx).ctx_dup)(ctx, h);
            assert_ne!(alias, h);
            assert_eq!(((*ctx).ctx_is_live)(ctx, alias), 1);

            ((*ctx).ctx_close)(ctx, h);
            assert_eq!(((*ctx).ctx_is_live)(ctx, h), 0);
            assert_eq!(((*ctx).ctx_is_live)(ctx, alias), 1);
            ((*ctx).ctx_close)(ctx, alias);
        }

        assert_eq!(bridge.manager().live_count(), 0);
        assert_eq!(bridge.manager().stats().live, 11);
    }

    #[test]
    fn test_constant_lookup_by_name() {
        let mut bridge = ContextBridge::new(Space);
        let ctx = bridge.as_native();
        let known = CString::new("False").unwrap();
        let unknown = CString::new("Ellipsis").unwrap();

        unsafe {
            assert_eq!(((*ctx).ctx_constant)(ctx, known.as_ptr()), (*ctx).h_false);
            assert_eq!(((*ctx).ctx_constant)(ctx, unknown.as_ptr()), Handle::NULL);
            assert_eq!(((*ctx).ctx_constant)(ctx, ptr::null()), Handle::NULL);
        }
    }

    #[test]
    fn test_bytes_pinned_until_close() {
        let mut bridge = ContextBridge::new(Space);
        let data = bridge
            .manager_mut()
            .new_handle(Rc::new(Value::Bytes(b"abc".to_vec())))
            .unwrap();
        let number = bridge.manager_mut().new_handle(Rc::new(Value::Int(1))).unwrap();
        let ctx = bridge.as_native();

        unsafe {
            let mut len = 0usize;
            let p = ((*ctx).ctx_bytes_as_ptr)(ctx, data, &mut len);
            assert_eq!(len, 3);
            assert_eq!(CStr::from_ptr(p).to_bytes(), b"abc");

            let none = ((*ctx).ctx_bytes_as_ptr)(ctx, number, ptr::null_mut());
            assert!(none.is_null());
        }

        assert_eq!(bridge.manager().attached_callbacks(data).unwrap(), 1);
        bridge.manager_mut().close(data).unwrap();
        bridge.manager_mut().close(number).unwrap();
    }

    #[test]
    fn test_version() {
        unsafe {
            let version = tether_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
        }
    }

    #[test]
    fn test_native_pointer_covers_whole_bridge() {
        let mut bridge = ContextBridge::new(Space);
        let whole = &mut *bridge as *mut ContextBridge<Space> as usize;
        let ctx = bridge.as_native();
        assert_eq!(ctx as usize, whole);

        unsafe {
            // shims reach the manager and the space through the header pointer
            let h = bridge_mut::<Space>(ctx)
                .manager
                .new_handle(Rc::new(Value::Bytes(b"xyz".to_vec())))
                .unwrap();
            let p = ((*ctx).ctx_bytes_as_ptr)(ctx, h, ptr::null_mut());
            assert_eq!(CStr::from_ptr(p).to_bytes(), b"xyz");
            assert_eq!(bridge_ref::<Space>(ctx).space().bytes(&Rc::new(Value::Int(0))), None);
            ((*ctx).ctx_close)(ctx, h);
            assert_eq!(((*ctx).ctx_is_live)(ctx, h), 0);
        }
        assert_eq!(bridge.manager().live_count(), 0);
    }

    #[test]
    fn test_failure_kind_separates_exhaustion_from_misuse() {
        assert_eq!(
            failure_kind(&HandleError::NotLive(Handle::from_raw(3))),
            "handle contract violated by native code"
        );
        assert_eq!(
            failure_kind(&HandleError::Exhausted { limit: 16 }),
            "handle operation failed at native boundary"
        );
    }
}
