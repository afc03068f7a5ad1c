//! ObjectSpace trait: the managed object system seen from the handle table
//!
//! The handle manager never inspects objects. It only needs to hold owned
//! references (`Clone` hands out another one, `Drop` gives it back to the
//! managed heap) and to ask the object system for its well-known singletons
//! when the constant handles are installed.

/// Well-known interpreter objects that get permanent constant handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Singleton {
    /// The `None` object
    None,
    /// The `False` object
    False,
    /// The `True` object
    True,
    /// The `ValueError` exception type
    ValueError,
    /// The `TypeError` exception type
    TypeError,
    /// The root `object` type
    BaseObjectType,
    /// The `type` type
    TypeType,
    /// The integer type
    LongType,
    /// The text string type
    UnicodeType,
    /// The tuple type
    TupleType,
    /// The list type
    ListType,
}

/// Abstract managed object system.
///
/// Implemented by the interpreter that owns the heap. One space backs one
/// [`HandleManager`](crate::HandleManager); independent interpreter contexts
/// use independent spaces and managers.
pub trait ObjectSpace {
    /// Owned reference to a managed object
    type Object: Clone;

    /// Produce the object for a well-known singleton
    fn singleton(&self, which: Singleton) -> Self::Object;

    /// Byte contents of a bytes-like object, if it is one
    fn bytes(&self, _object: &Self::Object) -> Option<Vec<u8>> {
        None
    }
}
