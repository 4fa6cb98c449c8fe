//! Search orchestration module
//!
//! Fans queries out to providers, merges and ranks their results and
//! serves repeated requests from the result cache.

mod executor;
mod models;

pub use executor::{Dispatch, DispatchOptions, Dispatcher};
pub use models::*;
