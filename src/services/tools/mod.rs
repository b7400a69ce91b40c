//! Tool Execution Service
//!
//! Extraction of tool calls from model output, validated execution against
//! the registry, downstream routing, and the audit trail.

pub mod audit;
pub mod executor;
pub mod extractor;
pub mod router;

pub use audit::{AuditRecord, AuditSink, HttpAuditSink, TracingAuditSink};
pub use executor::{ExecutedTool, ToolExecutor, CODE_EXECUTION_TOOL};
pub use extractor::{default_intent_rules, Extraction, ExtractionSource, IntentRule, ToolCallExtractor};
pub use router::{
    default_routes, register_routes, HttpServiceRouter, ServiceRouter, ToolRoute, UnroutedServices,
};
