//! Dashboard Configuration
//!
//! HTTP server settings with localhost-only defaults.

use crate::config::{env_flag, env_parse};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Dashboard server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Bind address (default: 127.0.0.1)
    pub bind_addr: IpAddr,
    /// Port number (default: 3000)
    pub port: u16,
    /// Restrict CORS to `cors_origins`
    pub cors_enabled: bool,
    /// Allowed CORS origins
    pub cors_origins: Vec<String>,
    /// Enable request logging
    pub log_requests: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            cors_enabled: true,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            log_requests: true,
        }
    }
}

impl DashboardConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(addr) = env_parse("PORTNOTE_BIND_ADDR") {
            config.bind_addr = addr;
        }

        if let Some(port) = env_parse("PORTNOTE_PORT") {
            config.port = port;
            config.cors_origins = vec![
                format!("http://localhost:{}", port),
                format!("http://127.0.0.1:{}", port),
            ];
        }

        if let Ok(origins) = std::env::var("PORTNOTE_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }

        if let Some(log) = env_flag("PORTNOTE_LOG_REQUESTS") {
            config.log_requests = log;
        }

        config
    }

    /// Check if bound to localhost only
    pub fn is_localhost(&self) -> bool {
        self.bind_addr.is_loopback()
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    /// Get the base URL for this server
    pub fn base_url(&self) -> String {
        let scheme = "http"; // HTTPS handled by reverse proxy
        format!("{}://{}:{}", scheme, self.bind_addr, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_localhost() {
        let config = DashboardConfig::default();
        assert!(config.is_localhost());
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_socket_addr() {
        let config = DashboardConfig::default();
        let addr = config.socket_addr();
        assert_eq!(addr.port(), 3000);
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn test_base_url() {
        let config = DashboardConfig {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            ..Default::default()
        };
        assert!(!config.is_localhost());
        assert_eq!(config.base_url(), "http://0.0.0.0:8080");
    }
}
