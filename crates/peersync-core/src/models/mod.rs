//! Data models for peersync

mod client;
mod outgoing_command;
mod tab;

pub use client::{ClientPayload, RemoteClient, DEFAULT_CLIENT_TYPE};
pub use outgoing_command::OutgoingCommand;
pub use tab::{ClientTabs, RemoteTab, TabPayload, TabsPayload};
