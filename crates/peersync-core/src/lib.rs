//! peersync-core - Core library for peersync
//!
//! This crate contains the record models, local libSQL store, and the
//! incremental sync passes for the `clients` and `tabs` collections used by
//! the peersync CLI.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
