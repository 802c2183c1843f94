pub mod client_addr;
pub mod cors;
pub mod rate_limit;
mod router;
mod state;

pub use cors::{AccessPolicy, AccessVerdict};
pub use rate_limit::{RateLimitConfig, RateLimitDecision, RateLimitKind, RateLimiter};
pub use router::{build_router, MAX_BODY_BYTES};
pub use state::ServeState;
