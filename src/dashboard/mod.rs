//! Web Dashboard Module
//!
//! HTTP surface of PortNote: the single-page UI, the inventory API and the
//! shared-credential login.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │           Dashboard Server               │
//! ├──────────────────────────────────────────┤
//! │  GET /                  → Static UI      │
//! │  POST /api/auth/login   → Issue token    │
//! │  POST /api/auth/validate→ Check token    │
//! │  POST /api/auth/logout  → Clear cookie   │
//! │  GET /api/get           → Inventory      │
//! │  POST /api/add          → Add row        │
//! │  PUT /api/update        → Update row     │
//! │  DELETE /api/delete     → Delete rows    │
//! │  POST /api/scan         → Queue scan     │
//! │  GET /api/search        → Fuzzy search   │
//! │  GET /api/health        → Health check   │
//! └──────────────────────────────────────────┘
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod server;

pub use api::{api_router, ApiState};
pub use auth::{
    auth_middleware, auth_router, AuthConfig, AuthError, AuthState, Claims, Credentials,
    LoginRequest, TokenResponse, TokenService,
};
pub use config::DashboardConfig;
pub use error::{ApiError, ErrorResponse};
pub use server::{shutdown_signal, DashboardServer};
