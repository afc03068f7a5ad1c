//! Tether: integer handles for managed objects
//!
//! Native code cannot hold raw addresses of objects living on a moving,
//! garbage-collected heap. This crate gives it small integer handles instead:
//!
//! - **Handle table**: growable slot array with a LIFO free list
//! - **Release callbacks**: one-shot cleanup tied to a handle's lifetime
//! - **Constant handles**: permanent low indices for interpreter singletons
//! - **Handle API**: new, close, deref, consume, dup, attach_release_callback
//! - **Scoped handles**: transient handles closed on every exit path
//!
//! Each interpreter context owns one [`HandleManager`]; there is no global
//! table and no internal locking.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod buffer;
pub mod callback;
pub mod constants;
pub mod error;
pub mod handle;
pub mod manager;
pub mod options;
pub mod scope;
pub mod space;
mod table;

pub use buffer::{BufferView, NonMovingBuffer};
pub use callback::{BoxedReleaseCallback, ReleaseCallback};
pub use constants::{well_known, ConstantDef, ConstantSet, DEFAULT_CONSTANTS};
pub use error::{HandleError, HandleResult, OptionsError, ReleaseError};
pub use handle::Handle;
pub use manager::{HandleManager, HandleStats};
pub use options::HandleOptions;
pub use scope::ScopedHandle;
pub use space::{ObjectSpace, Singleton};
