//! termsearch: an interactive console metasearch client
//!
//! Queries with `"phrase"`, `+required`, `-excluded` and `site:` operators
//! are fanned out to several providers in parallel, merged into one ranked
//! page, cached, and paged through from a read-eval-print loop.

pub mod cache;
pub mod commands;
pub mod config;
pub mod error;
pub mod metrics;
pub mod network;
pub mod providers;
pub mod query;
pub mod results;
pub mod search;
pub mod session;

pub use config::Settings;
pub use error::{ProviderError, SearchError};
pub use providers::Provider;
pub use query::Query;
pub use results::{ResultPage, SearchResult};
pub use search::{Dispatch, Dispatcher, Filters};
pub use session::SessionState;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
