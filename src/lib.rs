//! PortNote
//!
//! Self-hosted inventory of servers, the VMs they host, and the network
//! ports noted on each.
//!
//! # Features
//!
//! - **Inventory API**: CRUD over servers, VMs and ports (HTTP + JSON)
//! - **Shared login**: one configured credential, 7-day signed session token
//! - **Search**: fuzzy ranking over names, addresses, port numbers and notes
//! - **Scan agent**: TCP connect sweep for queued scan requests
//!
//! # Architecture
//!
//! ```text
//! Browser ──► Dashboard (axum) ──► Store (SQLite)
//!               │                     ▲
//!               ├── Auth (JWT)        │
//!               └── Search            │
//!                                     │
//! Scan agent ─────────────────────────┘
//! ```

pub mod config;
pub mod dashboard;
pub mod models;
pub mod scanner;
pub mod search;
pub mod store;

pub use config::Config;
pub use dashboard::{ApiError, AuthState, DashboardServer};
pub use models::{Port, Scan, Server, ServerWithPorts};
pub use scanner::{ScanAgent, ScannerConfig};
pub use store::{Store, StoreError};
