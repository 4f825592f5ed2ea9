use peersync_core::config::ClientConfig;
use peersync_core::db::{Database, LibSqlClientStore, LibSqlPrefs, LocalClientStore};
use peersync_core::models::{ClientTabs, RemoteClient, RemoteTab};
use peersync_core::sync::{
    Command, CommandReport, CommandSink, SyncOutcome, Watermarks, CLIENTS_COLLECTION,
    TABS_COLLECTION,
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use url::Url;

use crate::cli::Collection;
use crate::commands::common::{find_device, format_relative_time, format_sync_timestamp};
use crate::commands::config::{merge_profile, missing_fields};
use crate::commands::reset::reset_watermarks;
use crate::commands::send_tab::display_uri_command;
use crate::commands::status::{collect_status, format_status_lines};
use crate::commands::sync::{
    format_sync_report, CliCommandSink, CollectionReport, ReceivedTab, SyncReport,
};
use crate::commands::tabs::{filter_by_device, format_tab_lines};
use crate::error::CliError;

fn remote_client(guid: &str, name: &str) -> RemoteClient {
    RemoteClient {
        guid: guid.to_string(),
        name: name.to_string(),
        client_type: "desktop".to_string(),
        version: None,
        protocols: Vec::new(),
        os: Some("Linux".to_string()),
        form_factor: None,
        device: None,
        fxa_device_id: None,
        modified: 1_000,
    }
}

fn client_tabs(guid: &str, name: &str) -> ClientTabs {
    ClientTabs {
        client_guid: guid.to_string(),
        client_name: name.to_string(),
        modified: 1_000,
        tabs: vec![RemoteTab {
            client_guid: guid.to_string(),
            title: String::new(),
            url: "https://example.com/".to_string(),
            url_history: vec!["https://example.com/".to_string()],
            icon: None,
            last_used: 0,
        }],
    }
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn format_sync_timestamp_returns_utc_label() {
    assert_eq!(format_sync_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn find_device_prefers_guid_then_unique_name() {
    let clients = vec![
        remote_client("guid-1", "Laptop"),
        remote_client("guid-2", "Phone"),
        remote_client("guid-3", "phone"),
    ];

    assert_eq!(find_device(&clients, "guid-2").unwrap().name, "Phone");
    assert_eq!(find_device(&clients, " laptop ").unwrap().guid, "guid-1");
    assert!(matches!(
        find_device(&clients, "PHONE"),
        Err(CliError::AmbiguousDevice(_))
    ));
    assert!(matches!(
        find_device(&clients, "tablet"),
        Err(CliError::DeviceNotFound(_))
    ));
}

#[test]
fn display_uri_command_requires_absolute_url() {
    let command =
        display_uri_command("https://example.com/page", "me", Some("  ".to_string())).unwrap();
    assert_eq!(
        command,
        Command::DisplayUri {
            uri: Url::parse("https://example.com/page").unwrap(),
            sender: "me".to_string(),
            title: None,
        }
    );
    assert!(matches!(
        display_uri_command("example.com/page", "me", None),
        Err(CliError::InvalidUrl(_))
    ));
}

#[test]
fn merge_profile_prefers_flags_then_env_then_existing() {
    let existing = ClientConfig {
        storage_url: Some("https://old.example/1.5/1".to_string()),
        auth_token: Some("old-token".to_string()),
        client_id: Some("old-id".to_string()),
        client_name: Some("Old".to_string()),
    };
    let explicit = ClientConfig {
        storage_url: Some("https://flag.example/1.5/1".to_string()),
        client_name: Some(" ".to_string()),
        ..ClientConfig::default()
    };

    let merged = merge_profile(explicit, &existing, |name| {
        (name == "PEERSYNC_AUTH_TOKEN").then(|| "env-token".to_string())
    });

    assert_eq!(merged.storage_url.as_deref(), Some("https://flag.example/1.5/1"));
    assert_eq!(merged.auth_token.as_deref(), Some("env-token"));
    assert_eq!(merged.client_id.as_deref(), Some("old-id"));
    assert_eq!(merged.client_name.as_deref(), Some("Old"));
}

#[test]
fn missing_fields_lists_required_settings() {
    assert_eq!(
        missing_fields(&ClientConfig::default()),
        vec!["storage_url", "auth_token"]
    );
}

#[test]
fn filter_by_device_matches_guid_or_name() {
    let clients = vec![client_tabs("B", "Laptop"), client_tabs("C", "Phone")];

    let filtered = filter_by_device(clients.clone(), Some("laptop"));
    assert_eq!(filtered, vec![client_tabs("B", "Laptop")]);
    assert_eq!(filter_by_device(clients.clone(), Some("C")).len(), 1);
    assert_eq!(filter_by_device(clients, None).len(), 2);
}

#[test]
fn format_tab_lines_fall_back_to_url_for_untitled_tabs() {
    let lines = format_tab_lines(&[client_tabs("B", "Laptop")]);
    assert_eq!(lines[0], "Laptop (B), 1 tab(s)");
    assert!(lines[1].starts_with("  https://example.com/  <https://example.com/>"));
}

#[test]
fn format_sync_report_summarizes_each_collection() {
    let report = SyncReport {
        client_guid: "A".to_string(),
        collections: vec![
            CollectionReport::new(
                CLIENTS_COLLECTION,
                &Ok(SyncOutcome::Applied {
                    fetched: 2,
                    merged: 1,
                    deleted: 1,
                    wiped: true,
                    own_record: true,
                    commands: CommandReport {
                        executed: vec!["displayURI".to_string()],
                        ..CommandReport::default()
                    },
                    watermark: 1_000,
                }),
            ),
            CollectionReport::new(TABS_COLLECTION, &Ok(SyncOutcome::NoChanges { watermark: 5 })),
        ],
        received_tabs: vec![ReceivedTab {
            uri: "https://example.com/".to_string(),
            sender: "B".to_string(),
            title: Some("Example".to_string()),
        }],
    };

    assert_eq!(
        format_sync_report(&report),
        vec![
            "clients: fetched 2, stored 1, removed 1 (full refresh), ran 1 command(s)".to_string(),
            "tabs: up to date".to_string(),
            "Tab from B: Example <https://example.com/>".to_string(),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn command_sink_defers_watermark_resets() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("peersync.db")).await.unwrap();
    let prefs = LibSqlPrefs::new(db.connection());
    let watermarks = Watermarks::new(&prefs);
    watermarks.set(CLIENTS_COLLECTION, 10).await.unwrap();
    watermarks.set(TABS_COLLECTION, 20).await.unwrap();

    let sink = CliCommandSink::new();
    sink.reset_engine(Some(TABS_COLLECTION)).await.unwrap();
    assert_eq!(watermarks.get(TABS_COLLECTION).await.unwrap(), 20);

    // a pass committing after the command ran must not undo the reset
    watermarks.set(TABS_COLLECTION, 30).await.unwrap();
    let applied = sink.apply_resets(&prefs).await.unwrap();
    assert_eq!(applied, vec![TABS_COLLECTION.to_string()]);
    assert_eq!(watermarks.get(TABS_COLLECTION).await.unwrap(), 0);
    assert_eq!(watermarks.get(CLIENTS_COLLECTION).await.unwrap(), 10);

    sink.reset_engine(None).await.unwrap();
    let applied = sink.apply_resets(&prefs).await.unwrap();
    assert_eq!(
        applied,
        vec![CLIENTS_COLLECTION.to_string(), TABS_COLLECTION.to_string()]
    );
    assert_eq!(watermarks.get(CLIENTS_COLLECTION).await.unwrap(), 0);

    let uri = Url::parse("https://example.com/").unwrap();
    sink.display_uri(&uri, "B", None).await.unwrap();
    assert_eq!(
        sink.into_received(),
        vec![ReceivedTab {
            uri: "https://example.com/".to_string(),
            sender: "B".to_string(),
            title: None,
        }]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn status_and_reset_reflect_local_store() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("peersync.db")).await.unwrap();
    let prefs = LibSqlPrefs::new(db.connection());
    Watermarks::new(&prefs)
        .set(CLIENTS_COLLECTION, 1_700_000_000_000)
        .await
        .unwrap();

    let store = LibSqlClientStore::new(db.connection());
    store
        .upsert_remote_clients(&[remote_client("B", "Laptop")])
        .await
        .unwrap();
    let command = display_uri_command("https://example.com/", "A", None).unwrap();
    store
        .queue_command("B", command.name(), &command.args())
        .await
        .unwrap();

    let report = collect_status(&db, "A".to_string()).await.unwrap();
    assert_eq!(report.remote_clients, 1);
    assert_eq!(report.queued_commands, 1);
    assert_eq!(
        format_status_lines(&report)[1],
        "clients: 2023-11-14 22:13:20 UTC"
    );
    assert_eq!(format_status_lines(&report)[2], "tabs: never synced");

    reset_watermarks(&db, &[Collection::Clients]).await.unwrap();
    let report = collect_status(&db, "A".to_string()).await.unwrap();
    assert!(report.collections.iter().all(|status| status.watermark == 0));
}
