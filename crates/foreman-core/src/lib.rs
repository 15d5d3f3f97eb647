//! Orchestration core: scanner, scorer, dispatcher, executor, the
//! orchestrator loop, and the issue-tracker bridge.
//!
//! Durable state lives in `foreman-store`; this crate holds the closed-loop
//! logic that reads it, ranks work, and supervises workers.

pub mod bridge;
pub mod dispatch;
pub mod executor;
pub mod logging;
pub mod orchestrator;
pub mod scanner;
pub mod score;
pub mod token;
