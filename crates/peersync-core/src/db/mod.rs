//! Database layer for peersync

mod client_repository;
mod connection;
mod migrations;
mod prefs_repository;
mod tab_repository;

pub use client_repository::{LibSqlClientStore, LocalClientStore};
pub use connection::Database;
pub(crate) use connection::execute_in_transaction;
pub use prefs_repository::{LibSqlPrefs, MemoryPrefs, PrefsStore};
pub use tab_repository::{LibSqlTabStore, LocalTabStore};
