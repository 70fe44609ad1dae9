//! Coordination primitives - keyed queue, in-flight tracking, session resources

pub mod coordinator;
pub mod queue;
pub mod resources;

pub use coordinator::{AckOutcome, Admission, CommandDeferCoordinator, ExecutionGuard, ExecutionHandoff, PendingAck};
pub use queue::{KeyedAsyncQueue, QueueKey, TaskResult};
pub use resources::{ResourceKind, SessionResourceRegistry};

use std::any::Any;

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
