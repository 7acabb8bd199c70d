//! Inventory Store
//!
//! SQLite persistence for servers, ports and scan requests.
//!
//! `host` and `server_id` are plain integer columns: the store does not check
//! that the referenced server exists, so callers may add a VM pointing at a
//! missing host or a port for an unknown server. Deletes clean up referencing
//! rows explicitly instead of relying on foreign key cascades.

use crate::models::{
    NewPort, NewServer, Port, PortPatch, Scan, Server, ServerPatch, ServerWithPorts,
};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Rows removed by a cascading delete
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub servers: usize,
    pub ports: usize,
}

/// Inventory store with SQLite backend
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the inventory database
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        info!("Inventory store opened: {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS servers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                ip TEXT NOT NULL,
                host INTEGER
            );

            CREATE TABLE IF NOT EXISTS ports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                server_id INTEGER NOT NULL,
                note TEXT,
                port INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS scans (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                server_id INTEGER NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (unixepoch())
            );

            CREATE INDEX IF NOT EXISTS idx_servers_host ON servers(host);
            CREATE INDEX IF NOT EXISTS idx_ports_server_id ON ports(server_id);
            CREATE INDEX IF NOT EXISTS idx_scans_server_id ON scans(server_id);
            "#,
        )?;
        Ok(())
    }

    /// Cheap round trip used by the readiness probe
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn list_servers(&self) -> Result<Vec<Server>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, name, ip, host FROM servers ORDER BY id")?;
        let servers = stmt
            .query_map([], server_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(servers)
    }

    pub fn list_ports(&self) -> Result<Vec<Port>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, server_id, note, port FROM ports ORDER BY id")?;
        let ports = stmt
            .query_map([], port_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ports)
    }

    /// Every server with the ports whose `server_id` matches it.
    ///
    /// Ports pointing at a server that no longer exists are not returned.
    pub fn servers_with_ports(&self) -> Result<Vec<ServerWithPorts>> {
        let servers = self.list_servers()?;
        let mut by_server: HashMap<i64, Vec<Port>> = HashMap::new();
        for port in self.list_ports()? {
            by_server.entry(port.server_id).or_default().push(port);
        }

        Ok(servers
            .into_iter()
            .map(|server| {
                let ports = by_server.remove(&server.id).unwrap_or_default();
                ServerWithPorts { server, ports }
            })
            .collect())
    }

    pub fn get_server(&self, id: i64) -> Result<Option<Server>> {
        let conn = self.conn.lock();
        let server = conn
            .query_row(
                "SELECT id, name, ip, host FROM servers WHERE id = ?1",
                params![id],
                server_from_row,
            )
            .optional()?;
        Ok(server)
    }

    pub fn get_port(&self, id: i64) -> Result<Option<Port>> {
        let conn = self.conn.lock();
        let port = conn
            .query_row(
                "SELECT id, server_id, note, port FROM ports WHERE id = ?1",
                params![id],
                port_from_row,
            )
            .optional()?;
        Ok(port)
    }

    pub fn ports_for_server(&self, server_id: i64) -> Result<Vec<Port>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, server_id, note, port FROM ports WHERE server_id = ?1 ORDER BY port",
        )?;
        let ports = stmt
            .query_map(params![server_id], port_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ports)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    pub fn add_server(&self, new: &NewServer) -> Result<Server> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO servers (name, ip, host) VALUES (?1, ?2, ?3)",
            params![new.name, new.ip, new.host],
        )?;
        let id = conn.last_insert_rowid();

        debug!("Added server {} ({})", id, new.name);
        Ok(Server {
            id,
            name: new.name.clone(),
            ip: new.ip.clone(),
            host: new.host,
        })
    }

    pub fn add_port(&self, new: &NewPort) -> Result<Port> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO ports (server_id, note, port) VALUES (?1, ?2, ?3)",
            params![new.server_id, new.note, new.port],
        )?;
        let id = conn.last_insert_rowid();

        debug!("Added port {} to server {}", new.port, new.server_id);
        Ok(Port {
            id,
            server_id: new.server_id,
            note: new.note.clone(),
            port: new.port,
        })
    }

    /// Apply the fields present in `patch`; absent fields are left untouched
    pub fn update_server(&self, id: i64, patch: &ServerPatch) -> Result<()> {
        let mut columns = Vec::new();
        if let Some(name) = &patch.name {
            columns.push(("name", Value::Text(name.clone())));
        }
        if let Some(ip) = &patch.ip {
            columns.push(("ip", Value::Text(ip.clone())));
        }
        if let Some(host) = patch.host {
            columns.push(("host", host.map_or(Value::Null, Value::Integer)));
        }

        self.update_row("servers", "Server", id, columns)
    }

    /// Apply the fields present in `patch`; absent fields are left untouched
    pub fn update_port(&self, id: i64, patch: &PortPatch) -> Result<()> {
        let mut columns = Vec::new();
        if let Some(server_id) = patch.server_id {
            columns.push(("server_id", Value::Integer(server_id)));
        }
        if let Some(note) = &patch.note {
            columns.push(("note", note.clone().map_or(Value::Null, Value::Text)));
        }
        if let Some(port) = patch.port {
            columns.push(("port", Value::Integer(port)));
        }

        self.update_row("ports", "Port", id, columns)
    }

    fn update_row(
        &self,
        table: &str,
        entity: &'static str,
        id: i64,
        columns: Vec<(&str, Value)>,
    ) -> Result<()> {
        let conn = self.conn.lock();

        let changed = if columns.is_empty() {
            // Nothing to change, but the row must still exist
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE id = ?1", table),
                params![id],
                |row| row.get(0),
            )?;
            count as usize
        } else {
            let assignments = columns
                .iter()
                .map(|(column, _)| format!("{} = ?", column))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!("UPDATE {} SET {} WHERE id = ?", table, assignments);

            let values = columns
                .into_iter()
                .map(|(_, value)| value)
                .chain(std::iter::once(Value::Integer(id)));
            conn.execute(&sql, params_from_iter(values))?
        };

        if changed == 0 {
            return Err(StoreError::NotFound { entity, id });
        }

        debug!("Updated {} {}", entity, id);
        Ok(())
    }

    /// Delete a host, its VMs, and every port owned by any of them.
    ///
    /// Runs in one transaction; nothing is removed if the host does not exist.
    pub fn delete_host(&self, id: i64) -> Result<DeleteSummary> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let vm_ports = tx.execute(
            "DELETE FROM ports WHERE server_id IN (SELECT id FROM servers WHERE host = ?1)",
            params![id],
        )?;
        tx.execute(
            "DELETE FROM scans WHERE server_id IN (SELECT id FROM servers WHERE host = ?1)",
            params![id],
        )?;
        let vms = tx.execute("DELETE FROM servers WHERE host = ?1", params![id])?;
        let own_ports = tx.execute("DELETE FROM ports WHERE server_id = ?1", params![id])?;
        tx.execute("DELETE FROM scans WHERE server_id = ?1", params![id])?;
        let hosts = tx.execute("DELETE FROM servers WHERE id = ?1", params![id])?;

        if hosts == 0 {
            return Err(StoreError::NotFound { entity: "Server", id });
        }
        tx.commit()?;

        let summary = DeleteSummary {
            servers: vms + hosts,
            ports: vm_ports + own_ports,
        };
        info!(
            "Deleted host {} with {} VMs and {} ports",
            id, vms, summary.ports
        );
        Ok(summary)
    }

    /// Delete a single server and its own ports
    pub fn delete_vm(&self, id: i64) -> Result<DeleteSummary> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let ports = tx.execute("DELETE FROM ports WHERE server_id = ?1", params![id])?;
        tx.execute("DELETE FROM scans WHERE server_id = ?1", params![id])?;
        let servers = tx.execute("DELETE FROM servers WHERE id = ?1", params![id])?;

        if servers == 0 {
            return Err(StoreError::NotFound { entity: "Server", id });
        }
        tx.commit()?;

        info!("Deleted server {} with {} ports", id, ports);
        Ok(DeleteSummary { servers, ports })
    }

    pub fn delete_port(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM ports WHERE id = ?1", params![id])?;
        if removed == 0 {
            return Err(StoreError::NotFound { entity: "Port", id });
        }

        debug!("Deleted port {}", id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scans
    // ------------------------------------------------------------------

    /// Queue a scan request for a server
    pub fn add_scan(&self, server_id: i64) -> Result<Scan> {
        let conn = self.conn.lock();
        conn.execute("INSERT INTO scans (server_id) VALUES (?1)", params![server_id])?;
        let id = conn.last_insert_rowid();
        let scan = conn.query_row(
            "SELECT id, server_id, created_at FROM scans WHERE id = ?1",
            params![id],
            scan_from_row,
        )?;

        debug!("Queued scan {} for server {}", id, server_id);
        Ok(scan)
    }

    pub fn pending_scans(&self) -> Result<Vec<Scan>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, server_id, created_at FROM scans ORDER BY created_at, id")?;
        let scans = stmt
            .query_map([], scan_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(scans)
    }

    /// Remove every pending scan for a server
    pub fn clear_scans(&self, server_id: i64) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM scans WHERE server_id = ?1", params![server_id])?;
        Ok(removed)
    }

    /// Insert a port row for each open port not already tracked on the server.
    ///
    /// Returns the number of rows inserted.
    pub fn record_open_ports(&self, server_id: i64, open: &[u16]) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let existing: HashSet<i64> = {
            let mut stmt = tx.prepare("SELECT port FROM ports WHERE server_id = ?1")?;
            let rows = stmt
                .query_map(params![server_id], |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<HashSet<_>>>()?;
            rows
        };

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare("INSERT INTO ports (server_id, port) VALUES (?1, ?2)")?;
            let mut seen = HashSet::new();
            for port in open.iter().map(|&p| i64::from(p)) {
                if existing.contains(&port) || !seen.insert(port) {
                    continue;
                }
                stmt.execute(params![server_id, port])?;
                inserted += 1;
            }
        }
        tx.commit()?;

        if inserted > 0 {
            info!("Recorded {} new open ports on server {}", inserted, server_id);
        }
        Ok(inserted)
    }
}

fn server_from_row(row: &Row<'_>) -> rusqlite::Result<Server> {
    Ok(Server {
        id: row.get(0)?,
        name: row.get(1)?,
        ip: row.get(2)?,
        host: row.get(3)?,
    })
}

fn port_from_row(row: &Row<'_>) -> rusqlite::Result<Port> {
    Ok(Port {
        id: row.get(0)?,
        server_id: row.get(1)?,
        note: row.get(2)?,
        port: row.get(3)?,
    })
}

fn scan_from_row(row: &Row<'_>) -> rusqlite::Result<Scan> {
    Ok(Scan {
        id: row.get(0)?,
        server_id: row.get(1)?,
        created_at: row.get(2)?,
    })
}
