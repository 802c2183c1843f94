use std::sync::Arc;

use crate::store::LeadStore;

use super::cors::AccessPolicy;
use super::rate_limit::{RateLimitConfig, RateLimitKind, RateLimiter};

#[derive(Clone)]
pub struct ServeState {
    pub(crate) store: Arc<dyn LeadStore>,
    pub(crate) write_limiter: Arc<RateLimiter>,
    pub(crate) read_limiter: Arc<RateLimiter>,
    pub(crate) access: AccessPolicy,
    pub(crate) trusted_hops: usize,
}

impl ServeState {
    pub fn new(store: Arc<dyn LeadStore>, access: AccessPolicy, trusted_hops: usize) -> Self {
        Self::with_limits(
            store,
            access,
            trusted_hops,
            RateLimitConfig::WRITE,
            RateLimitConfig::READ,
        )
    }

    pub fn with_limits(
        store: Arc<dyn LeadStore>,
        access: AccessPolicy,
        trusted_hops: usize,
        write_limits: RateLimitConfig,
        read_limits: RateLimitConfig,
    ) -> Self {
        Self {
            store,
            write_limiter: Arc::new(RateLimiter::new(RateLimitKind::Write, write_limits)),
            read_limiter: Arc::new(RateLimiter::new(RateLimitKind::Read, read_limits)),
            access,
            trusted_hops,
        }
    }

    /// Both limiters, for background pruning.
    pub fn limiters(&self) -> [Arc<RateLimiter>; 2] {
        [
            Arc::clone(&self.write_limiter),
            Arc::clone(&self.read_limiter),
        ]
    }
}
