//! Inventory records
//!
//! Wire shapes for servers, ports and scan requests. Field names follow the
//! JSON the dashboard speaks (`serverId`, `createdAt`).

use serde::{Deserialize, Deserializer, Serialize};

/// A physical host (`host == None`) or a VM hosted on another server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: i64,
    pub name: String,
    pub ip: String,
    pub host: Option<i64>,
}

/// A tracked network port belonging to one server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Port {
    pub id: i64,
    pub server_id: i64,
    pub note: Option<String>,
    pub port: i64,
}

/// A pending scan request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scan {
    pub id: i64,
    pub server_id: i64,
    /// Unix timestamp (seconds)
    pub created_at: i64,
}

/// Server joined with its ports, as returned by the list endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerWithPorts {
    #[serde(flatten)]
    pub server: Server,
    pub ports: Vec<Port>,
}

/// Fields for a new server row
#[derive(Debug, Clone, Deserialize)]
pub struct NewServer {
    pub name: String,
    pub ip: String,
    #[serde(default)]
    pub host: Option<i64>,
}

/// Fields for a new port row
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPort {
    pub server_id: i64,
    #[serde(default)]
    pub note: Option<String>,
    pub port: i64,
}

/// Partial server update. `host: Some(None)` clears the host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerPatch {
    pub name: Option<String>,
    pub ip: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub host: Option<Option<i64>>,
}

/// Partial port update. `note: Some(None)` clears the note.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortPatch {
    pub server_id: Option<i64>,
    #[serde(default, deserialize_with = "double_option")]
    pub note: Option<Option<String>>,
    pub port: Option<i64>,
}

/// Distinguishes an explicit `null` from an absent field
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Target of an add or update request (`type` field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Server,
    Port,
}

impl TryFrom<i64> for EntityKind {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Server),
            1 => Ok(Self::Port),
            other => Err(other),
        }
    }
}

/// Target of a delete request (`type` field)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteKind {
    /// Host server, cascading to its VMs and every affected port
    Host,
    /// Single VM and its ports
    Vm,
    Port,
}

impl TryFrom<i64> for DeleteKind {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Host),
            1 => Ok(Self::Vm),
            2 => Ok(Self::Port),
            other => Err(other),
        }
    }
}
