//! Incremental sync of the `clients` and `tabs` collections.
//!
//! Each collection is synced by a single pass that fetches records newer than
//! the collection's watermark, applies them locally, and only then advances
//! the watermark.

mod client;
mod clients;
mod codec;
mod commands;
mod error;
mod info;
mod record;
mod synchronizer;
mod tabs;
mod watermark;

pub use client::{
    CollectionClient, CollectionStorage, HttpStorageClient, ResponseMetadata, StorageClientError,
    StorageClientResult, StorageResponse,
};
pub use clients::{ClientsSynchronizer, CLIENTS_COLLECTION};
pub use codec::{
    make_factory, Cleartext, CodecError, DecodeFn, Decoded, KeyProvider, PayloadDecryptor,
    RecordFactory, StaticKeys,
};
pub use commands::{
    parse as parse_commands, process_commands, Command, CommandError, CommandFailure,
    CommandOutcome, CommandReport, CommandSink,
};
pub use error::{SyncError, SyncResult};
pub use info::{has_remote_changes, InfoCollections};
pub use record::{Changes, Envelope, Record};
pub use synchronizer::{synchronize, MergeTarget, PassState, SyncContext, SyncOutcome};
pub use tabs::{TabsSynchronizer, TABS_COLLECTION};
pub use watermark::Watermarks;
