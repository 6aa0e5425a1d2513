//! baton-core: shared types and configuration for Baton.
//!
//! Holds the client identity and tier types every other crate keys on,
//! plus the `baton.toml` loader that turns operator configuration into
//! scheduler timings.

pub mod config;
pub mod error;
pub mod types;

pub use config::{BatonConfig, Timings};
pub use error::{CoreError, CoreResult};
pub use types::*;
