pub mod clients;
pub mod common;
pub mod config;
pub mod reset;
pub mod send_tab;
pub mod status;
pub mod sync;
pub mod tabs;
