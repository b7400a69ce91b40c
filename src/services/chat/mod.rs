//! Chat Service
//!
//! Request shapes, context enrichment, and the bounded agentic loop that
//! ties the provider cascade to tool execution.

pub mod enricher;
pub mod pipeline;
pub mod types;

pub use enricher::ContextEnricher;
pub use pipeline::{
    confidence_for_attempt, ChatPipeline, PipelineError, PipelineResult, EMERGENCY_CONFIDENCE,
};
pub use types::{ChatReply, ChatRequest, InboundMessage, EMERGENCY_PROVIDER};
