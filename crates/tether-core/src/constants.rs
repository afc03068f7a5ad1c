//! Constant handles: permanent low indices for interpreter singletons
//!
//! The constant table is evaluated once, in order, when a
//! [`HandleManager`](crate::HandleManager) is built, so every constant lands
//! on a deterministic index that native shims can hard-code. Index 0 is always
//! the null sentinel.

use crate::error::{HandleError, HandleResult};
use crate::handle::Handle;
use crate::space::Singleton;
use rustc_hash::FxHashMap;

/// One entry of a constant table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantDef {
    /// Name published to the native side
    pub name: &'static str,
    /// Object to install, `None` only for the null sentinel
    pub value: Option<Singleton>,
}

impl ConstantDef {
    /// Create a constant definition
    pub const fn new(name: &'static str, value: Option<Singleton>) -> Self {
        Self { name, value }
    }
}

/// The standard constant table, in index order
pub const DEFAULT_CONSTANTS: &[ConstantDef] = &[
    ConstantDef::new("NULL", None),
    ConstantDef::new("None", Some(Singleton::None)),
    ConstantDef::new("False", Some(Singleton::False)),
    ConstantDef::new("True", Some(Singleton::True)),
    ConstantDef::new("ValueError", Some(Singleton::ValueError)),
    ConstantDef::new("TypeError", Some(Singleton::TypeError)),
    ConstantDef::new("BaseObjectType", Some(Singleton::BaseObjectType)),
    ConstantDef::new("TypeType", Some(Singleton::TypeType)),
    ConstantDef::new("LongType", Some(Singleton::LongType)),
    ConstantDef::new("UnicodeType", Some(Singleton::UnicodeType)),
    ConstantDef::new("TupleType", Some(Singleton::TupleType)),
    ConstantDef::new("ListType", Some(Singleton::ListType)),
];

/// Handles of [`DEFAULT_CONSTANTS`], usable without a manager
pub mod well_known {
    use crate::handle::Handle;

    /// `NULL`
    pub const NULL: Handle = Handle::NULL;
    /// `None`
    pub const NONE: Handle = Handle::from_raw(1);
    /// `False`
    pub const FALSE: Handle = Handle::from_raw(2);
    /// `True`
    pub const TRUE: Handle = Handle::from_raw(3);
    /// `ValueError`
    pub const VALUE_ERROR: Handle = Handle::from_raw(4);
    /// `TypeError`
    pub const TYPE_ERROR: Handle = Handle::from_raw(5);
    /// `BaseObjectType`
    pub const BASE_OBJECT_TYPE: Handle = Handle::from_raw(6);
    /// `TypeType`
    pub const TYPE_TYPE: Handle = Handle::from_raw(7);
    /// `LongType`
    pub const LONG_TYPE: Handle = Handle::from_raw(8);
    /// `UnicodeType`
    pub const UNICODE_TYPE: Handle = Handle::from_raw(9);
    /// `TupleType`
    pub const TUPLE_TYPE: Handle = Handle::from_raw(10);
    /// `ListType`
    pub const LIST_TYPE: Handle = Handle::from_raw(11);
}

/// Check a custom constant table before installing it
pub fn validate_constants(defs: &[ConstantDef]) -> HandleResult<()> {
    let first = defs
        .first()
        .ok_or_else(|| HandleError::InvalidConstantTable("table is empty".to_string()))?;
    if first.value.is_some() {
        return Err(HandleError::InvalidConstantTable(format!(
            "entry 0 (`{}`) must be the null sentinel",
            first.name
        )));
    }

    let mut seen = FxHashMap::default();
    for (index, def) in defs.iter().enumerate() {
        if index > 0 && def.value.is_none() {
            return Err(HandleError::InvalidConstantTable(format!(
                "entry {index} (`{}`) has no object",
                def.name
            )));
        }
        if let Some(previous) = seen.insert(def.name, index) {
            return Err(HandleError::InvalidConstantTable(format!(
                "`{}` appears at {previous} and {index}",
                def.name
            )));
        }
    }
    Ok(())
}

/// Names and indices of the installed constants
#[derive(Debug, Clone)]
pub struct ConstantSet {
    names: Vec<&'static str>,
    by_name: FxHashMap<&'static str, Handle>,
}

impl ConstantSet {
    pub(crate) fn new(defs: &[ConstantDef]) -> Self {
        let names: Vec<&'static str> = defs.iter().map(|def| def.name).collect();
        let by_name = names
            .iter()
            .enumerate()
            .map(|(index, name)| (*name, Handle::from_raw(index as isize)))
            .collect();
        Self { names, by_name }
    }

    /// Number of constants, null included
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Look up a constant handle by name
    pub fn handle(&self, name: &str) -> Option<Handle> {
        self.by_name.get(name).copied()
    }

    /// Name of the constant at `handle`, if it is one
    pub fn name_of(&self, handle: Handle) -> Option<&'static str> {
        handle.index().and_then(|index| self.names.get(index).copied())
    }

    /// Check if `handle` is in the constant range
    pub fn contains(&self, handle: Handle) -> bool {
        self.name_of(handle).is_some()
    }

    /// Iterate `(name, handle)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Handle)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(index, name)| (*name, Handle::from_raw(index as isize)))
    }
}
