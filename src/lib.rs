//! Suite Gateway
//!
//! Resilient AI-provider gateway and tool-execution pipeline behind the Suite
//! executive dashboard. It includes:
//! - Gateway configuration (`config`)
//! - The provider cascade, tool executor, and chat pipeline (`services`)
//! - Process-wide wiring (`state`)
//! - The axum HTTP surface (`server`)

pub mod config;
pub mod server;
pub mod services;
pub mod state;

pub use config::GatewayConfig;
pub use services::chat::{ChatPipeline, ChatReply, ChatRequest, PipelineError};
pub use services::fallback::{CascadeError, FallbackOrchestrator};
pub use state::AppState;
