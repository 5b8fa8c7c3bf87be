//! Application layer containing the dialog orchestration.
//!
//! `DialogEngine` is the primary entry point for answering gateway
//! exchanges. Each dialog state has one handler; the transition table
//! declares where each handler may send the conversation next.

pub mod engine;
mod handlers;
mod menu;
pub mod transitions;

pub use handlers::Assessment;
