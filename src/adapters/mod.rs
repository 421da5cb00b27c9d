//! Port adapters: the control API, LLM clients, validators, cost guards.

pub mod cost;
pub mod http;
pub mod llm;
pub mod validators;
