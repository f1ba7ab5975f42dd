//! Per-client sliding-window limit on login attempts.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::LoginThrottleConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleDecision {
    Allowed,
    Limited { retry_after: Duration },
}

#[derive(Debug)]
pub struct LoginThrottle {
    max_attempts: usize,
    window: Duration,
    trusted_proxies: Vec<IpAddr>,
    attempts: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl LoginThrottle {
    #[must_use]
    pub fn new(config: &LoginThrottleConfig) -> Self {
        let trusted_proxies = config
            .trusted_proxy_ips
            .iter()
            .filter_map(|ip| match ip.parse() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    tracing::warn!("Ignoring invalid trusted proxy IP: {ip}");
                    None
                }
            })
            .collect();

        Self {
            max_attempts: usize::try_from(config.max_attempts).unwrap_or(usize::MAX),
            window: Duration::from_secs(config.window_seconds),
            trusted_proxies,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves the client identity for a request. A forwarded header is only
    /// honoured when the socket peer is a trusted proxy.
    #[must_use]
    pub fn client_key(&self, peer: Option<IpAddr>, forwarded_for: Option<&str>) -> String {
        if let Some(peer) = peer
            && self.trusted_proxies.contains(&peer)
            && let Some(first) = forwarded_for
                .and_then(|h| h.split(',').next())
                .map(str::trim)
                .and_then(|s| s.parse::<IpAddr>().ok())
        {
            return first.to_string();
        }

        peer.map_or_else(|| "unknown".to_string(), |ip| ip.to_string())
    }

    /// Records one attempt for `key` unless the window is already full.
    pub fn check(&self, key: &str) -> ThrottleDecision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> ThrottleDecision {
        let mut attempts = self
            .attempts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let window = attempts.entry(key.to_string()).or_default();

        while window
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            window.pop_front();
        }

        if window.len() >= self.max_attempts {
            let retry_after = window
                .front()
                .map_or(self.window, |oldest| {
                    self.window.saturating_sub(now.duration_since(*oldest))
                });
            return ThrottleDecision::Limited { retry_after };
        }

        window.push_back(now);
        ThrottleDecision::Allowed
    }

    /// Drops clients with no attempts left inside the window.
    pub fn prune(&self) {
        let now = Instant::now();
        let mut attempts = self
            .attempts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        attempts.retain(|_, window| {
            window
                .back()
                .is_some_and(|t| now.duration_since(*t) < self.window)
        });
    }

    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.attempts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}
