//! State reader port: read-only view of current entity state.

use std::future::Future;

use picolink_domain::status::EntityStatus;

/// Looks up what is currently known about an entity.
pub trait StateReader {
    /// `None` when the entity is unknown or its state is unavailable.
    fn status(&self, entity_id: &str) -> impl Future<Output = Option<EntityStatus>> + Send;
}

impl<T: StateReader + Send + Sync> StateReader for std::sync::Arc<T> {
    fn status(&self, entity_id: &str) -> impl Future<Output = Option<EntityStatus>> + Send {
        (**self).status(entity_id)
    }
}

