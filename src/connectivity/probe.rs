//! Network reachability probe
//!
//! A raw TCP connect to a well-known host with a short timeout. Any
//! failure counts as offline. The answer is reused for a fixed TTL.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::ConnectivityConfig;

/// A single reachability check
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn is_reachable(&self) -> bool;
}

/// TCP connect check against a fixed `host:port`
pub struct TcpReachability {
    target: String,
    timeout: Duration,
}

impl TcpReachability {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Reachability for TcpReachability {
    async fn is_reachable(&self) -> bool {
        let connect = tokio::net::TcpStream::connect(self.target.as_str());
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(error)) => {
                tracing::debug!(probe_target = %self.target, %error, "Connectivity probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(probe_target = %self.target, "Connectivity probe timed out");
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ProbeResult {
    online: bool,
    checked_at: Instant,
}

/// Caches the latest reachability answer for `ttl`.
pub struct ConnectivityProbe {
    check: Arc<dyn Reachability>,
    ttl: Duration,
    last: Mutex<Option<ProbeResult>>,
}

impl ConnectivityProbe {
    pub fn new(check: Arc<dyn Reachability>, ttl: Duration) -> Self {
        Self {
            check,
            ttl,
            last: Mutex::new(None),
        }
    }

    /// Probe built from configuration (default: 8.8.8.8:53, 1s timeout, 30s TTL)
    pub fn from_config(config: &ConnectivityConfig) -> Self {
        Self::new(
            Arc::new(TcpReachability::new(&config.target, config.timeout())),
            config.ttl(),
        )
    }

    fn cached(&self) -> Option<bool> {
        let last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (*last)
            .filter(|result| result.checked_at.elapsed() < self.ttl)
            .map(|result| result.online)
    }

    /// Whether the network is reachable, re-probing only once the TTL lapsed.
    pub async fn is_online(&self) -> bool {
        if let Some(online) = self.cached() {
            return online;
        }

        let online = self.check.is_reachable().await;
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(ProbeResult {
            online,
            checked_at: Instant::now(),
        });
        online
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn result_is_reused_within_ttl() {
        let mut check = MockReachability::new();
        check.expect_is_reachable().times(1).returning(|| true);

        let probe = ConnectivityProbe::new(Arc::new(check), Duration::from_secs(30));
        assert!(probe.is_online().await);
        assert!(probe.is_online().await);
        assert!(probe.is_online().await);
    }

    #[tokio::test]
    async fn expired_result_triggers_new_probe() {
        let mut check = MockReachability::new();
        let mut seq = mockall::Sequence::new();
        check
            .expect_is_reachable()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| true);
        check
            .expect_is_reachable()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| false);

        let probe = ConnectivityProbe::new(Arc::new(check), Duration::from_millis(20));
        assert!(probe.is_online().await);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!probe.is_online().await);
    }

    #[tokio::test]
    async fn tcp_probe_reports_listening_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let check = TcpReachability::new(addr.to_string(), Duration::from_secs(1));
        assert!(check.is_reachable().await);
    }

    #[tokio::test]
    async fn tcp_probe_treats_refused_connection_as_offline() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let check = TcpReachability::new(addr.to_string(), Duration::from_millis(500));
        assert!(!check.is_reachable().await);
    }
}
