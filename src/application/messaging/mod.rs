//! Interaction handling - guard chain, parsing and dispatch

pub mod dispatcher;
pub mod middleware;
pub mod parser;

pub use dispatcher::{DispatchOutcome, DropReason, InteractionDispatcher, ACK_QUEUE, START_COMMAND};
pub use middleware::{
    LoggingMiddleware, Middleware, MiddlewareChain, MiddlewareError, RateLimitMiddleware, RoleGuardMiddleware,
};
pub use parser::InteractionParser;
