//! # fieldlog
//!
//! Field observation log. Records named measurements with a location,
//! filters and exports them, summarizes recent activity, and answers
//! questions through a generative-language assistant with a keyword
//! fallback.
//!
//! Persistence is owner-scoped (Postgres via sqlx, or in memory), LLM
//! delegation goes to Gemini over HTTP, and observability is
//! tracing + OpenTelemetry.

pub mod assistant;
pub mod auth;
pub mod collector;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod filter;
pub mod llm;
pub mod model;
pub mod store;
pub mod telemetry;
