//! Integration Tests Module
//!
//! Cross-crate scenarios for the Suite gateway, all in-process: scripted
//! providers stand in for AI backends and fixture tools for downstream
//! services.

// Shared fixtures
mod support;

// Provider cascade ordering, fast-fail and breaker windows
mod cascade_test;

// Agentic loop, synthesis and emergency fallback
mod pipeline_test;

// axum routes and response envelopes
mod http_test;

// Provider response normalization
mod normalization_test;
