//! Suite Gateway Core
//!
//! Foundational types shared by every crate in the Suite gateway workspace.
//! This crate has no dependencies on providers, tools, or the HTTP surface.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `clock` - Injectable time source (`Clock`, `SystemClock`, `ManualClock`)
//! - `context` - Request identity and tool-call context (`Identity`, `RequestContext`, `ToolContext`)

pub mod clock;
pub mod context;
pub mod error;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Time ───────────────────────────────────────────────────────────────
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};

// ── Request Context ────────────────────────────────────────────────────
pub use context::{ExecutionContext, Identity, RequestContext, ToolContext};
