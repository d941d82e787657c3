//! Adapter between registry state changes and connection fan-out.

use kaboo_hub::HubHandle;
use kaboo_protocol::{Codec, ServerEvent, UserId};

/// Delivers a lobby event to a set of users, best-effort.
///
/// Called by the registry after a change is durable, so a lost
/// notification never corrupts lobby state. Must not block.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, users: &[UserId], event: &ServerEvent);
}

impl<C: Codec> Notifier for HubHandle<C> {
    fn notify(&self, users: &[UserId], event: &ServerEvent) {
        self.broadcast(users, event);
    }
}
