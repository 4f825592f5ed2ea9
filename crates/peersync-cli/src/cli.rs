use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use peersync_core::sync::{CLIENTS_COLLECTION, TABS_COLLECTION};

#[derive(Parser)]
#[command(name = "peersync")]
#[command(about = "Sync the device list and open tabs of your other devices")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Profile name holding storage settings
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch remote changes for the clients and tabs collections
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List known devices
    Clients {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List open tabs of other devices
    Tabs {
        /// Only show tabs of this device (GUID or name)
        #[arg(long, value_name = "DEVICE")]
        device: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Queue a tab to open on another device
    SendTab {
        /// Target device GUID or name
        device: String,
        /// URL to open
        url: String,
        /// Optional page title
        #[arg(long)]
        title: Option<String>,
    },
    /// Show watermarks and local store counts
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Forget watermarks so the next sync refetches from scratch
    Reset {
        /// Collection to reset (all when omitted)
        #[arg(value_enum)]
        collection: Option<Collection>,
        /// Also delete the collection on the server
        #[arg(long)]
        remote: bool,
        /// Confirm a remote delete
        #[arg(long)]
        yes: bool,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Collection {
    Clients,
    Tabs,
}

impl Collection {
    pub const ALL: [Self; 2] = [Self::Clients, Self::Tabs];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Clients => CLIENTS_COLLECTION,
            Self::Tabs => TABS_COLLECTION,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Storage endpoint URL (e.g. <https://sync.example.com/1.5/12345>)
        #[arg(long, value_name = "URL")]
        storage_url: Option<String>,
        /// Bearer token for the storage endpoint
        #[arg(long, value_name = "TOKEN")]
        auth_token: Option<String>,
        /// Fixed GUID for this device
        #[arg(long, value_name = "GUID")]
        client_id: Option<String>,
        /// Display name of this device
        #[arg(long, value_name = "NAME")]
        client_name: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile (token redacted)
    Show {
        /// Profile name to show
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}
