//! TTL-based blacklist of failed instance addresses

use chrono::{DateTime, Utc};
use routelet_core::{validate_seconds, BlacklistConfig, RouteletResult};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Blacklist key: two instances with the same address are the same target
pub(crate) type Address = (String, u16);

/// A single blacklist record
#[derive(Debug, Clone)]
struct BlacklistEntry {
    reason: String,
    added_at: Instant,
    added_at_utc: DateTime<Utc>,
    /// TTL in force when the entry was added or refreshed
    ttl: Duration,
}

impl BlacklistEntry {
    /// The one authoritative expiry check, shared by the lazy read path
    /// and the recovery probe.
    fn is_expired(&self) -> bool {
        self.added_at.elapsed() >= self.ttl
    }

    fn remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.added_at.elapsed())
    }
}

/// Runtime-tunable settings shared between the store and the probe loop
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub ttl: Duration,
    pub probe_interval: Duration,
    pub connection_timeout: Duration,
}

impl Settings {
    fn from_config(config: &BlacklistConfig) -> RouteletResult<Self> {
        config.validate()?;
        Ok(Self {
            ttl: Duration::from_secs_f64(config.ttl_seconds),
            probe_interval: Duration::from_secs_f64(config.probe_interval_secs),
            connection_timeout: Duration::from_secs_f64(config.connection_timeout_secs),
        })
    }
}

/// Serializable view of one blacklisted address
#[derive(Debug, Clone, Serialize)]
pub struct BlacklistedInstance {
    /// `"ip:port"` address
    pub address: String,
    /// Reason recorded by the last failure report
    pub reason: String,
    /// Wall-clock time of the last add or refresh
    pub added_at: DateTime<Utc>,
    /// Seconds until TTL expiry
    pub expires_in_secs: f64,
}

/// Thread-safe mapping of address to blacklist entry with TTL expiry.
///
/// Cloning is cheap and all clones share the same entries and settings;
/// the recovery probe holds one clone and callers hold another.
#[derive(Clone)]
pub struct Blacklist {
    entries: Arc<RwLock<HashMap<Address, BlacklistEntry>>>,
    settings: Arc<RwLock<Settings>>,
}

impl Blacklist {
    /// Create a new blacklist from validated configuration
    pub fn new(config: &BlacklistConfig) -> RouteletResult<Self> {
        Ok(Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            settings: Arc::new(RwLock::new(Settings::from_config(config)?)),
        })
    }

    /// Insert or refresh the entry for an address.
    ///
    /// A repeated add resets the entry age and overwrites the reason; the
    /// TTL in force at this moment is captured into the entry.
    pub async fn add(&self, ip: &str, port: u16, reason: &str) {
        let ttl = self.settings.read().await.ttl;
        let mut entries = self.entries.write().await;
        entries.insert(
            (ip.to_string(), port),
            BlacklistEntry {
                reason: reason.to_string(),
                added_at: Instant::now(),
                added_at_utc: Utc::now(),
                ttl,
            },
        );
        debug!(
            address = %format!("{}:{}", ip, port),
            reason = reason,
            ttl_secs = ttl.as_secs_f64(),
            "Blacklisted instance"
        );
    }

    /// Whether an address is currently blacklisted.
    ///
    /// An entry whose age exceeds its TTL is treated as absent and lazily
    /// removed, even if the background probe has not run yet.
    pub async fn is_blacklisted(&self, ip: &str, port: u16) -> bool {
        let key = (ip.to_string(), port);
        {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                None => return false,
                Some(entry) if !entry.is_expired() => return true,
                Some(_) => {}
            }
        }

        // Found a stale entry; re-check under the write lock before removing
        // in case a concurrent add refreshed it.
        let mut entries = self.entries.write().await;
        match entries.get(&key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(&key);
                debug!(
                    address = %format!("{}:{}", ip, port),
                    "Blacklist entry expired"
                );
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Snapshot of all non-expired entries as `"ip:port" -> reason`
    pub async fn get_all(&self) -> HashMap<String, String> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|((ip, port), entry)| (format!("{}:{}", ip, port), entry.reason.clone()))
            .collect()
    }

    /// Serializable snapshot of all non-expired entries
    pub async fn snapshot(&self) -> Vec<BlacklistedInstance> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|((ip, port), entry)| BlacklistedInstance {
                address: format!("{}:{}", ip, port),
                reason: entry.reason.clone(),
                added_at: entry.added_at_utc,
                expires_in_secs: entry.remaining().as_secs_f64(),
            })
            .collect()
    }

    /// Remove the entry for an address; returns whether one was present.
    ///
    /// This is the probe's recovery path. The probe only ever removes, so a
    /// dial that outlives a `clear()` can never resurrect cleared state.
    pub(crate) async fn remove(&self, ip: &str, port: u16) -> bool {
        let mut entries = self.entries.write().await;
        entries.remove(&(ip.to_string(), port)).is_some()
    }

    /// Remove all entries unconditionally
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        info!(removed = count, "Cleared blacklist");
    }

    /// Update the entry TTL; applies to entries added or refreshed after
    /// this call
    pub async fn set_ttl(&self, seconds: f64) -> RouteletResult<()> {
        validate_seconds("ttl_seconds", seconds)?;
        self.settings.write().await.ttl = Duration::from_secs_f64(seconds);
        Ok(())
    }

    /// Update the probe cadence; takes effect on the next cycle
    pub async fn set_probe_interval(&self, seconds: f64) -> RouteletResult<()> {
        validate_seconds("probe_interval_secs", seconds)?;
        self.settings.write().await.probe_interval = Duration::from_secs_f64(seconds);
        Ok(())
    }

    /// Update the per-probe dial timeout; takes effect on the next cycle
    pub async fn set_connection_timeout(&self, seconds: f64) -> RouteletResult<()> {
        validate_seconds("connection_timeout_secs", seconds)?;
        self.settings.write().await.connection_timeout = Duration::from_secs_f64(seconds);
        Ok(())
    }

    /// Non-expired addresses, snapshotted for a probe cycle
    pub(crate) async fn addresses(&self) -> Vec<Address> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(address, _)| address.clone())
            .collect()
    }

    pub(crate) async fn probe_interval(&self) -> Duration {
        self.settings.read().await.probe_interval
    }

    pub(crate) async fn connection_timeout(&self) -> Duration {
        self.settings.read().await.connection_timeout
    }
}
