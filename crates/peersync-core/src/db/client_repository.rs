//! Peer device repository implementation

use crate::error::{Error, Result};
use crate::models::{OutgoingCommand, RemoteClient};
use crate::util::unix_timestamp_millis;
use libsql::{Connection, Value};

use super::connection::execute_in_transaction;

const CLIENT_COLUMNS: &str =
    "guid, name, client_type, version, protocols, os, form_factor, device, fxa_device_id, modified";

/// Local storage of peer devices from the `clients` collection (async)
#[allow(async_fn_in_trait)]
pub trait LocalClientStore {
    /// Delete every stored peer device. Leaves the outbound command queue alone.
    async fn wipe_remote_clients(&self) -> Result<()>;

    /// Insert or replace peers keyed by GUID, all or nothing
    async fn upsert_remote_clients(&self, clients: &[RemoteClient]) -> Result<usize>;

    /// Remove peers whose records were deleted on the server, all or nothing
    async fn delete_remote_clients(&self, guids: &[String]) -> Result<usize>;
}

/// libSQL implementation of `LocalClientStore`
pub struct LibSqlClientStore<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlClientStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// List stored peers, most recently modified first
    pub async fn list(&self) -> Result<Vec<RemoteClient>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {CLIENT_COLUMNS} FROM remote_clients ORDER BY modified DESC, guid"),
                (),
            )
            .await?;

        let mut clients = Vec::new();
        while let Some(row) = rows.next().await? {
            clients.push(Self::parse_client(&row)?);
        }
        Ok(clients)
    }

    /// Get a stored peer by GUID
    pub async fn get(&self, guid: &str) -> Result<Option<RemoteClient>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {CLIENT_COLUMNS} FROM remote_clients WHERE guid = ?"),
                [guid],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_client(&row)?)),
            None => Ok(None),
        }
    }

    /// Queue a command for delivery to `client_guid`
    pub async fn queue_command(
        &self,
        client_guid: &str,
        command: &str,
        args: &[serde_json::Value],
    ) -> Result<OutgoingCommand> {
        if client_guid.trim().is_empty() {
            return Err(Error::InvalidInput("client GUID must not be empty".into()));
        }
        let created_at = unix_timestamp_millis();
        let args_json = serde_json::to_string(args)?;

        self.conn
            .execute(
                "INSERT INTO outgoing_commands (client_guid, command, args, created_at)
                 VALUES (?, ?, ?, ?)",
                libsql::params![client_guid, command, args_json, created_at],
            )
            .await?;

        Ok(OutgoingCommand {
            id: self.conn.last_insert_rowid(),
            client_guid: client_guid.to_string(),
            command: command.to_string(),
            args: args.to_vec(),
            created_at,
        })
    }

    /// List queued outbound commands, oldest first
    pub async fn outgoing_commands(&self) -> Result<Vec<OutgoingCommand>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, client_guid, command, args, created_at
                 FROM outgoing_commands
                 ORDER BY id",
                (),
            )
            .await?;

        let mut commands = Vec::new();
        while let Some(row) = rows.next().await? {
            let args: String = row.get(3)?;
            commands.push(OutgoingCommand {
                id: row.get(0)?,
                client_guid: row.get(1)?,
                command: row.get(2)?,
                args: serde_json::from_str(&args)?,
                created_at: row.get(4)?,
            });
        }
        Ok(commands)
    }

    /// Parse a peer from a database row
    fn parse_client(row: &libsql::Row) -> Result<RemoteClient> {
        let protocols: String = row.get(4)?;
        let modified: i64 = row.get(9)?;
        Ok(RemoteClient {
            guid: row.get(0)?,
            name: row.get(1)?,
            client_type: row.get(2)?,
            version: row.get(3)?,
            protocols: serde_json::from_str(&protocols)?,
            os: row.get(5)?,
            form_factor: row.get(6)?,
            device: row.get(7)?,
            fxa_device_id: row.get(8)?,
            modified: u64::try_from(modified).unwrap_or_default(),
        })
    }
}

impl LocalClientStore for LibSqlClientStore<'_> {
    async fn wipe_remote_clients(&self) -> Result<()> {
        let removed = self.conn.execute("DELETE FROM remote_clients", ()).await?;
        tracing::debug!(removed, "Wiped remote clients");
        Ok(())
    }

    async fn upsert_remote_clients(&self, clients: &[RemoteClient]) -> Result<usize> {
        if clients.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "INSERT OR REPLACE INTO remote_clients ({CLIENT_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
        let mut statements = Vec::with_capacity(clients.len());
        for client in clients {
            statements.push((
                sql.as_str(),
                vec![
                    Value::from(client.guid.clone()),
                    Value::from(client.name.clone()),
                    Value::from(client.client_type.clone()),
                    Value::from(client.version.clone()),
                    Value::from(serde_json::to_string(&client.protocols)?),
                    Value::from(client.os.clone()),
                    Value::from(client.form_factor.clone()),
                    Value::from(client.device.clone()),
                    Value::from(client.fxa_device_id.clone()),
                    Value::from(i64::try_from(client.modified).unwrap_or(i64::MAX)),
                ],
            ));
        }

        execute_in_transaction(self.conn, &statements).await?;
        Ok(clients.len())
    }

    async fn delete_remote_clients(&self, guids: &[String]) -> Result<usize> {
        if guids.is_empty() {
            return Ok(0);
        }

        let statements: Vec<(&str, Vec<Value>)> = guids
            .iter()
            .map(|guid| {
                (
                    "DELETE FROM remote_clients WHERE guid = ?",
                    vec![Value::from(guid.clone())],
                )
            })
            .collect();
        execute_in_transaction(self.conn, &statements).await?;
        tracing::debug!(removed = guids.len(), "Deleted remote clients");
        Ok(guids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn client(guid: &str, name: &str, modified: u64) -> RemoteClient {
        RemoteClient {
            guid: guid.to_string(),
            name: name.to_string(),
            client_type: "desktop".to_string(),
            version: Some("120.0".to_string()),
            protocols: vec!["1.5".to_string()],
            os: None,
            form_factor: None,
            device: None,
            fxa_device_id: Some(format!("fxa-{guid}")),
            modified,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_and_list() {
        let db = setup().await;
        let store = LibSqlClientStore::new(db.connection());

        let written = store
            .upsert_remote_clients(&[client("B", "Laptop", 100), client("C", "Phone", 200)])
            .await
            .unwrap();
        assert_eq!(written, 2);

        let listed = store.list().await.unwrap();
        assert_eq!(listed, vec![client("C", "Phone", 200), client("B", "Laptop", 100)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_replaces_by_guid() {
        let db = setup().await;
        let store = LibSqlClientStore::new(db.connection());

        store.upsert_remote_clients(&[client("B", "Laptop", 100)]).await.unwrap();
        store.upsert_remote_clients(&[client("B", "Renamed", 300)]).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed, vec![client("B", "Renamed", 300)]);
        assert_eq!(store.get("B").await.unwrap(), Some(client("B", "Renamed", 300)));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_wipe_preserves_outgoing_commands() {
        let db = setup().await;
        let store = LibSqlClientStore::new(db.connection());

        store.upsert_remote_clients(&[client("B", "Laptop", 100)]).await.unwrap();
        let queued = store
            .queue_command("B", "displayURI", &[json!("https://example.com"), json!("A")])
            .await
            .unwrap();

        store.wipe_remote_clients().await.unwrap();

        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(store.outgoing_commands().await.unwrap(), vec![queued]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_queue_command_rejects_empty_guid() {
        let db = setup().await;
        let store = LibSqlClientStore::new(db.connection());

        assert!(matches!(
            store.queue_command(" ", "wipeAll", &[]).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_empty_upsert_is_a_no_op() {
        let db = setup().await;
        let store = LibSqlClientStore::new(db.connection());
        assert_eq!(store.upsert_remote_clients(&[]).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_removes_only_named_peers() {
        let db = setup().await;
        let store = LibSqlClientStore::new(db.connection());

        store
            .upsert_remote_clients(&[client("B", "Laptop", 100), client("C", "Phone", 200)])
            .await
            .unwrap();
        let queued = store.queue_command("B", "wipeAll", &[]).await.unwrap();

        let removed = store
            .delete_remote_clients(&["B".to_string(), "unknown".to_string()])
            .await
            .unwrap();

        assert_eq!(removed, 2);
        assert_eq!(store.list().await.unwrap(), vec![client("C", "Phone", 200)]);
        assert_eq!(store.outgoing_commands().await.unwrap(), vec![queued]);
        assert_eq!(store.delete_remote_clients(&[]).await.unwrap(), 0);
    }
}
