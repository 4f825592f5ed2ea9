//! Peer tab repository implementation

use crate::error::Result;
use crate::models::{ClientTabs, RemoteTab};
use libsql::{Connection, Value};

use super::connection::execute_in_transaction;

/// Local storage of peer tab lists from the `tabs` collection (async)
#[allow(async_fn_in_trait)]
pub trait LocalTabStore {
    /// Delete every stored peer tab list
    async fn wipe_remote_tabs(&self) -> Result<()>;

    /// Replace the tab list of each given peer, all or nothing
    async fn upsert_tabs_for_clients(&self, clients: &[ClientTabs]) -> Result<usize>;

    /// Remove the tab lists of peers whose records were deleted, all or nothing
    async fn delete_tabs_for_clients(&self, client_guids: &[String]) -> Result<usize>;
}

/// libSQL implementation of `LocalTabStore`
pub struct LibSqlTabStore<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlTabStore<'a> {
    /// Create a new store with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// List every peer with its tabs, most recently modified peer first
    pub async fn list(&self) -> Result<Vec<ClientTabs>> {
        let mut rows = self
            .conn
            .query(
                "SELECT client_guid, client_name, modified
                 FROM remote_tab_clients
                 ORDER BY modified DESC, client_guid",
                (),
            )
            .await?;

        let mut clients = Vec::new();
        while let Some(row) = rows.next().await? {
            let modified: i64 = row.get(2)?;
            clients.push(ClientTabs {
                client_guid: row.get(0)?,
                client_name: row.get(1)?,
                modified: u64::try_from(modified).unwrap_or_default(),
                tabs: Vec::new(),
            });
        }

        for client in &mut clients {
            client.tabs = self.tabs_for_client(&client.client_guid).await?;
        }
        Ok(clients)
    }

    /// List one peer's tabs in the order the peer sent them
    pub async fn tabs_for_client(&self, client_guid: &str) -> Result<Vec<RemoteTab>> {
        let mut rows = self
            .conn
            .query(
                "SELECT client_guid, title, url, url_history, icon, last_used
                 FROM remote_tabs
                 WHERE client_guid = ?
                 ORDER BY position",
                [client_guid],
            )
            .await?;

        let mut tabs = Vec::new();
        while let Some(row) = rows.next().await? {
            let url_history: String = row.get(3)?;
            let last_used: i64 = row.get(5)?;
            tabs.push(RemoteTab {
                client_guid: row.get(0)?,
                title: row.get(1)?,
                url: row.get(2)?,
                url_history: serde_json::from_str(&url_history)?,
                icon: row.get(4)?,
                last_used: u64::try_from(last_used).unwrap_or_default(),
            });
        }
        Ok(tabs)
    }
}

impl LocalTabStore for LibSqlTabStore<'_> {
    async fn wipe_remote_tabs(&self) -> Result<()> {
        let removed = self.conn.execute("DELETE FROM remote_tab_clients", ()).await?;
        // Tabs cascade from their client header; clear any orphans as well
        self.conn.execute("DELETE FROM remote_tabs", ()).await?;
        tracing::debug!(removed, "Wiped remote tabs");
        Ok(())
    }

    async fn upsert_tabs_for_clients(&self, clients: &[ClientTabs]) -> Result<usize> {
        if clients.is_empty() {
            return Ok(0);
        }

        let mut statements: Vec<(&str, Vec<Value>)> = Vec::new();
        for client in clients {
            let guid = Value::from(client.client_guid.clone());
            statements.push((
                "DELETE FROM remote_tabs WHERE client_guid = ?",
                vec![guid.clone()],
            ));
            statements.push((
                "INSERT OR REPLACE INTO remote_tab_clients (client_guid, client_name, modified)
                 VALUES (?, ?, ?)",
                vec![
                    guid.clone(),
                    Value::from(client.client_name.clone()),
                    Value::from(i64::try_from(client.modified).unwrap_or(i64::MAX)),
                ],
            ));
            for (position, tab) in client.tabs.iter().enumerate() {
                statements.push((
                    "INSERT INTO remote_tabs
                     (client_guid, position, title, url, url_history, icon, last_used)
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                    vec![
                        guid.clone(),
                        Value::from(i64::try_from(position).unwrap_or(i64::MAX)),
                        Value::from(tab.title.clone()),
                        Value::from(tab.url.clone()),
                        Value::from(serde_json::to_string(&tab.url_history)?),
                        Value::from(tab.icon.clone()),
                        Value::from(i64::try_from(tab.last_used).unwrap_or(i64::MAX)),
                    ],
                ));
            }
        }

        execute_in_transaction(self.conn, &statements).await?;
        Ok(clients.len())
    }

    async fn delete_tabs_for_clients(&self, client_guids: &[String]) -> Result<usize> {
        if client_guids.is_empty() {
            return Ok(0);
        }

        let mut statements: Vec<(&str, Vec<Value>)> = Vec::with_capacity(client_guids.len() * 2);
        for guid in client_guids {
            let guid = Value::from(guid.clone());
            statements.push(("DELETE FROM remote_tabs WHERE client_guid = ?", vec![guid.clone()]));
            statements.push(("DELETE FROM remote_tab_clients WHERE client_guid = ?", vec![guid]));
        }
        execute_in_transaction(self.conn, &statements).await?;
        Ok(client_guids.len())
    }
}
