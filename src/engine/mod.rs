// Appointment scheduling and lifecycle engine.
//
// Route handlers are presentation glue: they build a Principal from the
// session context, call into the LifecycleController or the store's query
// layer, and translate EngineError into HTTP responses. Nothing in here
// reads ambient request state.

pub mod conflict;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod store;

#[cfg(test)]
mod tests;

use uuid::Uuid;

use crate::models::Role;

/// Authenticated caller identity, fixed for the duration of one engine call.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}
