pub mod catalog;
pub mod cli;
pub mod computation;
pub mod config;
pub mod executor;
pub mod parser;

// Re-export main types
pub use catalog::{Catalog, CatalogError, Template};
pub use computation::{
    Computation, ComputationError, ComputationResult, ComputationState, Limits, Outcome,
    PendingCleanup, Snapshot,
};
pub use config::{Config, ConfigError};
pub use executor::{Effect, Val};
