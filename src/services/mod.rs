//! Gateway services
//!
//! - `fallback` - provider registry, circuit breaker, and the cascade
//! - `tools` - tool-call extraction, execution, routing, and audit
//! - `synthesis` - tool-result synthesis and the emergency fallback
//! - `chat` - request enrichment and the agentic loop

pub mod chat;
pub mod fallback;
pub mod synthesis;
pub mod tools;
