//! Result Synthesis
//!
//! Natural-language answers from tool output, and the deterministic
//! emergency report used when no AI provider is reachable.

pub mod emergency;
pub mod synthesizer;

pub use emergency::{default_emergency_rules, EmergencyFallback, EmergencyReport, EmergencyRule};
pub use synthesizer::{template_summary, ResultSynthesizer, Synthesis};
