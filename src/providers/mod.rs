//! Search provider module
//!
//! Defines the Provider trait, the HTTP backends behind it and a registry
//! of configured providers.

mod http;
mod loader;
mod registry;
mod throttle;
mod traits;

// Provider implementations
pub mod duckduckgo;
pub mod simulation;
pub mod wikipedia;

pub use http::HttpProvider;
pub use loader::ProviderLoader;
pub use registry::{ProviderRegistry, ProviderSlot};
pub use simulation::SimulationProvider;
pub use throttle::Throttle;
pub use traits::*;
