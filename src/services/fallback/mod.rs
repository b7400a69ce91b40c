//! Provider Fallback Service
//!
//! The provider registry, circuit breaker, rate limiter, and credential
//! resolver, and the orchestrator that drives the cascade across them.

pub mod chain;
pub mod circuit_breaker;
pub mod credentials;
pub mod rate_limit;
pub mod registry;

pub use chain::{
    CascadeError, CascadeResult, FallbackAttempt, FallbackExecutionLog, FallbackOrchestrator,
    ProviderFailure,
};
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use credentials::{CredentialResolver, EnvCredentialResolver};
pub use rate_limit::RateLimiter;
pub use registry::{ProviderRegistry, RegistryEntry};
