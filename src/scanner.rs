//! Scan Agent
//!
//! Consumes queued scan requests: every tick it sweeps the TCP ports of each
//! requested server, records newly found open ports, and drops the request.
//!
//! A request whose server is gone or whose address does not resolve stays
//! queued and is retried on the next tick.

use crate::config::env_parse;
use crate::store::{Store, StoreError};
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for the scan agent
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Delay between queue checks
    pub interval: Duration,
    /// Per-port connect timeout
    pub connect_timeout: Duration,
    /// Maximum connect attempts in flight
    pub concurrency: usize,
    /// First port swept
    pub port_start: u16,
    /// Last port swept (inclusive)
    pub port_end: u16,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            connect_timeout: Duration::from_millis(750),
            concurrency: 512,
            port_start: 1,
            port_end: u16::MAX,
        }
    }
}

impl ScannerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = env_parse::<u64>("SCAN_INTERVAL_SECS") {
            config.interval = Duration::from_secs(secs.max(1));
        }
        if let Some(ms) = env_parse::<u64>("SCAN_TIMEOUT_MS") {
            config.connect_timeout = Duration::from_millis(ms.max(1));
        }
        if let Some(n) = env_parse::<usize>("SCAN_CONCURRENCY") {
            config.concurrency = n.max(1);
        }
        if let Some(start) = env_parse::<u16>("SCAN_PORT_START") {
            config.port_start = start.max(1);
        }
        if let Some(end) = env_parse::<u16>("SCAN_PORT_END") {
            config.port_end = end;
        }
        if config.port_start > config.port_end {
            warn!(
                "SCAN_PORT_START {} is above SCAN_PORT_END {}, using defaults",
                config.port_start, config.port_end
            );
            let defaults = Self::default();
            config.port_start = defaults.port_start;
            config.port_end = defaults.port_end;
        }

        config
    }

    pub fn ports(&self) -> RangeInclusive<u16> {
        self.port_start..=self.port_end
    }
}

/// Outcome of one pass over the queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub servers_scanned: usize,
    pub ports_recorded: usize,
    pub skipped: usize,
}

/// Resolve a server's `ip` field, which may also hold a hostname
pub async fn resolve_target(address: &str) -> std::io::Result<IpAddr> {
    if let Ok(ip) = address.trim().parse::<IpAddr>() {
        return Ok(ip);
    }

    tokio::net::lookup_host((address.trim(), 0))
        .await?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no address for {}", address),
            )
        })
}

/// TCP connect sweep; returns the open ports in ascending order
pub async fn scan_ports(
    ip: IpAddr,
    ports: RangeInclusive<u16>,
    connect_timeout: Duration,
    concurrency: usize,
) -> Vec<u16> {
    let open: BTreeSet<u16> = stream::iter(ports)
        .map(move |port| async move {
            let addr = SocketAddr::new(ip, port);
            match timeout(connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(_)) => Some(port),
                _ => None,
            }
        })
        .buffer_unordered(concurrency.max(1))
        .filter_map(|port| async move { port })
        .collect()
        .await;

    open.into_iter().collect()
}

/// Background consumer of the scan queue
pub struct ScanAgent {
    store: Arc<Store>,
    config: ScannerConfig,
}

impl ScanAgent {
    pub fn new(store: Arc<Store>, config: ScannerConfig) -> Self {
        Self { store, config }
    }

    /// Process every queued request once
    pub async fn run_once(&self) -> Result<ScanReport, StoreError> {
        let server_ids: BTreeSet<i64> = self
            .store
            .pending_scans()?
            .into_iter()
            .map(|scan| scan.server_id)
            .collect();

        let mut report = ScanReport::default();
        for server_id in server_ids {
            let Some(server) = self.store.get_server(server_id)? else {
                warn!("Scan requested for unknown server {}", server_id);
                report.skipped += 1;
                continue;
            };

            let ip = match resolve_target(&server.ip).await {
                Ok(ip) => ip,
                Err(e) => {
                    warn!("Cannot resolve {} ({}): {}", server.name, server.ip, e);
                    report.skipped += 1;
                    continue;
                }
            };

            debug!("Scanning {} ({}) ports {:?}", server.name, ip, self.config.ports());
            let open = scan_ports(
                ip,
                self.config.ports(),
                self.config.connect_timeout,
                self.config.concurrency,
            )
            .await;

            report.ports_recorded += self.store.record_open_ports(server.id, &open)?;
            self.store.clear_scans(server.id)?;
            report.servers_scanned += 1;

            info!(
                "Scanned {} ({}): {} open ports",
                server.name,
                ip,
                open.len()
            );
        }

        Ok(report)
    }

    /// Poll the queue until `shutdown` flips to true
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting scan agent (every {:?}, ports {}-{})",
            self.config.interval, self.config.port_start, self.config.port_end
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Shutdown also cancels a pass in flight
                    tokio::select! {
                        result = self.run_once() => {
                            if let Err(e) = result {
                                warn!("Scan pass failed: {}", e);
                            }
                        }
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                info!("Scan agent shutting down mid-pass");
                                break;
                            }
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Scan agent shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewServer;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    fn local_config(port: u16) -> ScannerConfig {
        ScannerConfig {
            interval: Duration::from_millis(50),
            connect_timeout: Duration::from_millis(250),
            concurrency: 8,
            port_start: port,
            port_end: port,
        }
    }

    #[tokio::test]
    async fn test_resolve_literal_ip() {
        let ip = resolve_target(" 127.0.0.1 ").await.unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn test_scan_finds_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let open = scan_ports(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            port..=port,
            Duration::from_millis(250),
            4,
        )
        .await;
        assert_eq!(open, vec![port]);
    }

    #[tokio::test]
    async fn test_run_once_records_ports_and_clears_queue() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let store = Arc::new(Store::open_in_memory().unwrap());
        let server = store
            .add_server(&NewServer {
                name: "local".into(),
                ip: "127.0.0.1".into(),
                host: None,
            })
            .unwrap();
        store.add_scan(server.id).unwrap();
        store.add_scan(server.id).unwrap();

        let agent = ScanAgent::new(store.clone(), local_config(port));
        let report = agent.run_once().await.unwrap();

        assert_eq!(report.servers_scanned, 1);
        assert_eq!(report.ports_recorded, 1);
        assert!(store.pending_scans().unwrap().is_empty());

        let ports = store.ports_for_server(server.id).unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].port, i64::from(port));
        assert_eq!(ports[0].note, None);

        // A second request does not duplicate known ports
        store.add_scan(server.id).unwrap();
        let report = agent.run_once().await.unwrap();
        assert_eq!(report.ports_recorded, 0);
        assert_eq!(store.ports_for_server(server.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_server_stays_queued() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.add_scan(404).unwrap();

        let agent = ScanAgent::new(store.clone(), local_config(1));
        let report = agent.run_once().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(store.pending_scans().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let agent = Arc::new(ScanAgent::new(store, local_config(1)));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(agent.run(rx));
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("agent did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_running_pass() {
        // TEST-NET-1 is unroutable, so connects hang until the timeout
        let store = Arc::new(Store::open_in_memory().unwrap());
        let server = store
            .add_server(&NewServer {
                name: "filtered".into(),
                ip: "192.0.2.1".into(),
                host: None,
            })
            .unwrap();
        store.add_scan(server.id).unwrap();

        let config = ScannerConfig {
            interval: Duration::from_millis(10),
            connect_timeout: Duration::from_secs(30),
            concurrency: 1,
            port_start: 1,
            port_end: 1000,
        };
        let agent = Arc::new(ScanAgent::new(store, config));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(agent.run(rx));
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("agent did not stop mid-pass")
            .unwrap();
    }
}
