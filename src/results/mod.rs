//! Result types and the merge container
//!
//! This module defines the result structures shared by providers, the
//! cache and the session, and the container that merges provider pages.

mod container;
mod types;

pub use container::MergeContainer;
pub use types::*;
