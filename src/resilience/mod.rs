//! Resilience primitives: circuit breaking, rate limiting, cancellation and
//! the retrying client that combines them.

pub mod circuit_breaker;
pub mod rate_limiter;
pub mod retry;
pub mod scope;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitPermit, CircuitSnapshot, CircuitState,
};
pub use rate_limiter::{Admission, RateLimitConfig, RateLimitStatus, RateWindow};
pub use retry::{RetryConfig, RetryingClient};
pub use scope::{Interrupted, RequestScope};
