//! Release callbacks: cleanup tied to a single handle's lifetime
//!
//! A callback is attached to one handle and fires exactly once, when that
//! handle is closed or consumed. Callbacks attached to the same handle run in
//! attachment order. Aliases made with `dup` start with no callbacks.

use crate::error::{HandleError, HandleResult, ReleaseError};
use crate::handle::Handle;

/// One-shot cleanup action run when a handle is closed.
///
/// `release` takes `Box<Self>`, so a callback is consumed by running it and
/// cannot fire twice.
pub trait ReleaseCallback<T> {
    /// Release whatever native resource is tied to `handle`
    fn release(self: Box<Self>, handle: Handle, object: &T) -> Result<(), ReleaseError>;
}

impl<T, F> ReleaseCallback<T> for F
where
    F: FnOnce(Handle, &T) -> Result<(), ReleaseError>,
{
    fn release(self: Box<Self>, handle: Handle, object: &T) -> Result<(), ReleaseError> {
        (*self)(handle, object)
    }
}

/// Boxed callback as stored in a slot
pub type BoxedReleaseCallback<T> = Box<dyn ReleaseCallback<T>>;

/// Run every callback in order, returning the first failure.
///
/// A failure does not stop the remaining callbacks: each one still gets its
/// single chance to release its resource.
pub(crate) fn run_release_callbacks<T>(
    handle: Handle,
    object: &T,
    callbacks: Vec<BoxedReleaseCallback<T>>,
) -> HandleResult<()> {
    let mut first_failure = None;

    for (position, callback) in callbacks.into_iter().enumerate() {
        if let Err(source) = callback.release(handle, object) {
            tracing::warn!(%handle, position, error = %source, "release callback failed");
            if first_failure.is_none() {
                first_failure = Some(HandleError::ReleaseFailed {
                    handle,
                    position,
                    source,
                });
            }
        }
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
