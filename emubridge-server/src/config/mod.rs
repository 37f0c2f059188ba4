//! Configuration management for the bridge
//!
//! Values come from, highest first: CLI flags, environment variables, the
//! config file, built-in defaults.

mod defaults;
mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::*;
