use std::path::Path;

use peersync_core::db::{Database, LibSqlPrefs};
use peersync_core::sync::{CollectionStorage, HttpStorageClient, Watermarks};

use crate::cli::Collection;
use crate::commands::common::{load_sync_settings, open_database};
use crate::error::CliError;

/// Forget the watermarks of `collections`; their next pass wipes and refetches.
pub async fn reset_watermarks(db: &Database, collections: &[Collection]) -> Result<(), CliError> {
    let prefs = LibSqlPrefs::new(db.connection());
    let watermarks = Watermarks::new(&prefs);
    for collection in collections {
        watermarks.clear(collection.name()).await?;
    }
    Ok(())
}

pub async fn run_reset(
    db_path: &Path,
    profile: Option<&str>,
    collection: Option<Collection>,
    remote: bool,
    confirmed: bool,
) -> Result<(), CliError> {
    let collections = collection.map_or_else(|| Collection::ALL.to_vec(), |collection| vec![collection]);

    if remote {
        if !confirmed {
            return Err(CliError::ConfirmationRequired);
        }
        let settings = load_sync_settings(profile)?;
        let storage = HttpStorageClient::new(&settings.storage_url, &settings.auth_token)?;
        for collection in &collections {
            storage.delete_all(collection.name()).await?;
            println!("Deleted {} on the server", collection.name());
        }
    }

    let db = open_database(db_path).await?;
    reset_watermarks(&db, &collections).await?;
    for collection in &collections {
        println!("Reset {}; next sync refetches it", collection.name());
    }
    Ok(())
}
