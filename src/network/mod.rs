//! HTTP networking module
//!
//! Provides the HTTP client used by providers that talk to remote search
//! services.

mod client;
mod user_agent;

pub use client::HttpClient;
pub use user_agent::{accept_json, accept_language, generate_user_agent};
