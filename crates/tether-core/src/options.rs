//! Handle manager configuration

use crate::error::OptionsError;
use serde::Deserialize;

const DEFAULT_INITIAL_CAPACITY: usize = 64;

/// Options for a [`HandleManager`](crate::HandleManager)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HandleOptions {
    /// Slots reserved up front (constants included)
    pub initial_capacity: usize,

    /// Maximum number of slots the table may grow to (None = unlimited)
    pub max_handles: Option<usize>,

    /// Reject close/consume/attach on constant handles
    pub protect_constants: bool,
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            max_handles: None,
            protect_constants: true,
        }
    }
}

impl HandleOptions {
    /// Set the number of slots reserved up front
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Limit the table to `max` slots
    pub fn with_max_handles(mut self, max: usize) -> Self {
        self.max_handles = Some(max);
        self
    }

    /// Enable or disable constant protection
    pub fn with_constant_protection(mut self, protect: bool) -> Self {
        self.protect_constants = protect;
        self
    }

    /// Parse options from a TOML fragment
    ///
    /// ```toml
    /// initial_capacity = 256
    /// max_handles = 65536
    /// protect_constants = true
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, OptionsError> {
        let options: HandleOptions = toml::from_str(source)?;
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<(), OptionsError> {
        if self.max_handles == Some(0) {
            return Err(OptionsError::Invalid(
                "max_handles must leave room for the null handle".to_string(),
            ));
        }
        Ok(())
    }
}
