//! Shared bootstrap utilities for session hosts.
//!
//! Provides configuration loading, logging, map loading, and runtime setup
//! that can be reused by the headless host or other front-end crates.
pub mod builder;
pub mod config;
pub mod logging;
pub mod maps;

pub use builder::{HostBuilder, HostSetup};
pub use config::HostConfig;
pub use maps::{MapFile, load_encounter};
