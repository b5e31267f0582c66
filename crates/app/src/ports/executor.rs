//! Action executor port: performs one resolved, fully expanded call.
//!
//! The core never knows how a call travels (websocket, REST, in-memory).
//! Implementations report a vanished target as
//! [`DispatchError::EntityNotFound`] so running ramps can stop retrying.

use std::future::Future;

use picolink_domain::action::ActionCall;
use picolink_domain::error::DispatchError;

/// Carries out service calls.
pub trait ActionExecutor {
    /// Execute a single call whose targets are concrete entity identifiers.
    fn execute(&self, call: ActionCall) -> impl Future<Output = Result<(), DispatchError>> + Send;
}

impl<T: ActionExecutor + Send + Sync> ActionExecutor for std::sync::Arc<T> {
    fn execute(&self, call: ActionCall) -> impl Future<Output = Result<(), DispatchError>> + Send {
        (**self).execute(call)
    }
}
