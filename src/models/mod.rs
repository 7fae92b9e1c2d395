//! Core data models for solace.

mod config;
mod error;
mod record;

pub use config::*;
pub use error::*;
pub use record::*;
