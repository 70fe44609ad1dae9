//! Guard chain run on every interaction before it reaches a command

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::domain::entities::Interaction;

/// Context passed through the guard chain
#[derive(Debug, Clone)]
pub struct Context {
    pub interaction: Interaction,
    pub data: HashMap<String, String>,
}

impl Context {
    pub fn new(interaction: Interaction) -> Self {
        Self {
            interaction,
            data: HashMap::new(),
        }
    }

    pub fn group_id(&self) -> &str {
        self.interaction.group_id.as_str()
    }

    pub fn user_id(&self) -> &str {
        &self.interaction.user_id
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }
}

/// A processor that may let an interaction through, annotate it, or stop it
pub trait Middleware: Send + Sync {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult;
}

pub type MiddlewareResult = Result<Context, MiddlewareError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiddlewareError {
    Blocked(String),
    RateLimited { retry_after: Duration },
    /// The member lacks a required role
    PermissionDenied(String),
    Internal(String),
}

impl MiddlewareError {
    /// Reply shown to the user, if the rejection should be explained
    pub fn user_message(&self) -> Option<String> {
        match self {
            MiddlewareError::PermissionDenied(role) => Some(format!("You need the `{}` role to do that.", role)),
            MiddlewareError::RateLimited { retry_after } => {
                Some(format!("Slow down, try again in {}s.", retry_after.as_secs().max(1)))
            }
            MiddlewareError::Blocked(_) | MiddlewareError::Internal(_) => None,
        }
    }
}

impl std::fmt::Display for MiddlewareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MiddlewareError::Blocked(msg) => write!(f, "Blocked: {}", msg),
            MiddlewareError::RateLimited { retry_after } => {
                write!(f, "Rate limited, retry after {:?}", retry_after)
            }
            MiddlewareError::PermissionDenied(role) => write!(f, "Missing role: {}", role),
            MiddlewareError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for MiddlewareError {}

/// The rest of the chain
#[derive(Clone)]
pub struct Next {
    remaining: Arc<[Arc<dyn Middleware>]>,
}

impl Next {
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            remaining: middlewares.into(),
        }
    }

    pub fn run(self, ctx: Context) -> MiddlewareResult {
        match self.remaining.split_first() {
            Some((first, rest)) => first.process(ctx, Next::new(rest.to_vec())),
            None => Ok(ctx),
        }
    }
}

pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn build(self) -> Vec<Arc<dyn Middleware>> {
        self.middlewares
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Lets through members holding at least one of the required roles.
///
/// An empty role list admits everyone.
pub struct RoleGuardMiddleware {
    required: HashSet<String>,
}

impl RoleGuardMiddleware {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: roles.into_iter().map(Into::into).collect(),
        }
    }
}

impl Middleware for RoleGuardMiddleware {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult {
        if self.required.is_empty() || ctx.interaction.member_roles.iter().any(|r| self.required.contains(r)) {
            return next.run(ctx);
        }
        let mut roles: Vec<&String> = self.required.iter().collect();
        roles.sort();
        let wanted = roles.into_iter().map(String::as_str).collect::<Vec<_>>().join(" or ");
        Err(MiddlewareError::PermissionDenied(wanted))
    }
}

/// Sliding-window limit per user
pub struct RateLimitMiddleware {
    requests: Mutex<HashMap<String, Vec<Instant>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimitMiddleware {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    fn check_rate_limit(&self, key: &str) -> Result<(), MiddlewareError> {
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let times = requests.entry(key.to_string()).or_default();
        times.retain(|&t| now.duration_since(t) < self.window);

        if times.len() >= self.max_requests as usize {
            let retry_after = times
                .first()
                .map(|t| self.window.saturating_sub(now.duration_since(*t)))
                .unwrap_or(self.window);
            return Err(MiddlewareError::RateLimited { retry_after });
        }

        times.push(now);
        Ok(())
    }
}

impl Middleware for RateLimitMiddleware {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult {
        let key = format!("{}/{}", ctx.group_id(), ctx.user_id());
        self.check_rate_limit(&key)?;
        next.run(ctx)
    }
}

pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult {
        let interaction = &ctx.interaction;
        tracing::debug!(
            session = %interaction.group_id,
            user = %interaction.user_id,
            kind = interaction.kind.as_str(),
            label = interaction.label().unwrap_or("-"),
            "Interaction received"
        );
        let group = interaction.group_id.clone();

        let result = next.run(ctx);
        if let Err(e) = &result {
            tracing::debug!(session = %group, "Interaction rejected: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(chain: Vec<Arc<dyn Middleware>>, interaction: Interaction) -> MiddlewareResult {
        Next::new(chain).run(Context::new(interaction))
    }

    #[test]
    fn test_empty_chain_passes_through() {
        let result = run(Vec::new(), Interaction::button("guild", "alice", ">"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_role_guard_rejects_members_without_role() {
        let chain = MiddlewareChain::new().add(RoleGuardMiddleware::new(["DJ"])).build();

        let rejected = run(chain.clone(), Interaction::button("guild", "alice", ">"));
        assert_eq!(rejected.unwrap_err(), MiddlewareError::PermissionDenied("DJ".to_string()));

        let admitted = run(chain, Interaction::button("guild", "bob", ">").with_roles(vec!["DJ".to_string()]));
        assert!(admitted.is_ok());
    }

    #[test]
    fn test_role_guard_without_roles_admits_everyone() {
        let chain = MiddlewareChain::new().add(RoleGuardMiddleware::new(Vec::<String>::new())).build();
        assert!(run(chain, Interaction::button("guild", "alice", ">")).is_ok());
    }

    #[test]
    fn test_rate_limit_is_per_user() {
        let chain = MiddlewareChain::new()
            .add(RateLimitMiddleware::new(2, Duration::from_secs(60)))
            .build();

        assert!(run(chain.clone(), Interaction::button("guild", "alice", ">")).is_ok());
        assert!(run(chain.clone(), Interaction::button("guild", "alice", ">")).is_ok());
        let limited = run(chain.clone(), Interaction::button("guild", "alice", ">"));
        assert!(matches!(limited, Err(MiddlewareError::RateLimited { .. })));
        assert!(limited.unwrap_err().user_message().is_some());

        assert!(run(chain, Interaction::button("guild", "bob", ">")).is_ok());
    }
}
