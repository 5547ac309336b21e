//! Background recovery probing for blacklisted addresses

use crate::blacklist::Blacklist;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Periodically dials every blacklisted address and removes entries that
/// accept a TCP connection. Dial failures are swallowed; the entry keeps
/// aging toward TTL expiry.
#[derive(Clone)]
pub struct RecoveryProbe {
    blacklist: Blacklist,
}

impl RecoveryProbe {
    /// Create a probe over a blacklist handle
    pub fn new(blacklist: Blacklist) -> Self {
        Self { blacklist }
    }

    /// Dial one address with the configured timeout.
    ///
    /// Usable directly as an eager health check; the scheduled loop calls
    /// the same primitive.
    pub async fn probe_instance(&self, ip: &str, port: u16) -> bool {
        let timeout = self.blacklist.connection_timeout().await;
        let address = format!("{}:{}", ip, port);

        match tokio::time::timeout(timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                debug!(address = %address, "Probe connected");
                true
            }
            Ok(Err(e)) => {
                debug!(address = %address, error = %e, "Probe dial failed");
                false
            }
            Err(_) => {
                debug!(address = %address, timeout = ?timeout, "Probe timed out");
                false
            }
        }
    }

    /// Run one recovery sweep: snapshot the blacklisted addresses, dial
    /// them concurrently, and remove the ones that responded.
    pub async fn run_cycle(&self) {
        let addresses = self.blacklist.addresses().await;
        if addresses.is_empty() {
            return;
        }
        debug!(count = addresses.len(), "Starting recovery sweep");

        let checks: Vec<_> = addresses
            .into_iter()
            .map(|(ip, port)| async move {
                let reachable = self.probe_instance(&ip, port).await;
                (ip, port, reachable)
            })
            .collect();

        for (ip, port, reachable) in futures::future::join_all(checks).await {
            if reachable && self.blacklist.remove(&ip, port).await {
                info!(
                    address = %format!("{}:{}", ip, port),
                    "Instance recovered, removed from blacklist"
                );
            }
        }
    }

    /// Start the scheduling loop on its own task.
    ///
    /// The interval is re-read before every cycle, so setter changes apply
    /// from the next cycle without aborting one in progress.
    pub fn spawn(self) -> ProbeHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            loop {
                let interval = self.blacklist.probe_interval().await;
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(interval) => self.run_cycle().await,
                }
            }
            debug!("Recovery probe stopped");
        });

        ProbeHandle { shutdown_tx, task }
    }
}

/// Handle to a running recovery probe loop
pub struct ProbeHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ProbeHandle {
    /// Stop the loop and wait for it to quiesce.
    ///
    /// Consumes the handle, so stopping twice is unrepresentable. An
    /// in-flight sweep is awaited; after return no further dials or store
    /// mutations can come from the probe.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}
