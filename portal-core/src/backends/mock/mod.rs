use crate::Result;
use crate::structs::{Credentials, Network};
use crate::traits::{PolicyCheck, WifiBackend};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;

/// SSID that the mock refuses to join, for exercising failure paths.
pub const FAILING_SSID: &str = "xfinitywifi";

/// A mock backend for testing purposes.
/// It simulates scanning and connecting without any real hardware interaction.
#[derive(Debug)]
pub struct MockBackend {
    networks: Vec<Network>,
    scan_delay: Duration,
    connect_delay: Duration,
    fail_scans: AtomicBool,
    connected: AtomicBool,
    scans: AtomicUsize,
    last_connect: Mutex<Option<Credentials>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::with_networks(default_networks()).with_delays(Duration::from_secs(2), Duration::from_secs(3))
    }

    /// A mock returning `networks` from every scan, without delays.
    pub fn with_networks(networks: Vec<Network>) -> Self {
        Self {
            networks,
            scan_delay: Duration::ZERO,
            connect_delay: Duration::ZERO,
            fail_scans: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            scans: AtomicUsize::new(0),
            last_connect: Mutex::new(None),
        }
    }

    pub fn with_delays(mut self, scan: Duration, connect: Duration) -> Self {
        self.scan_delay = scan;
        self.connect_delay = connect;
        self
    }

    /// Make subsequent scans fail (or succeed again).
    pub fn set_fail_scans(&self, fail: bool) {
        self.fail_scans.store(fail, Ordering::SeqCst);
    }

    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    pub async fn last_connect(&self) -> Option<Credentials> {
        self.last_connect.lock().await.clone()
    }
}

fn default_networks() -> Vec<Network> {
    vec![
        Network::new("MyHomeWiFi", -38),
        Network::new("CafeGuest", -52),
        Network::new("xfinitywifi", -61),
        Network::new("Neighbor's Network", -74),
        Network::new("HiddenNetwork", -85),
    ]
}

#[async_trait]
impl WifiBackend for MockBackend {
    async fn enter_provisioning_mode(&self) -> Result<()> {
        tracing::info!("🤖 [MockBackend] Entering provisioning mode (simulated).");
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<Network>> {
        tracing::info!("🤖 [MockBackend] Scanning for networks...");
        self.scans.fetch_add(1, Ordering::SeqCst);
        sleep(self.scan_delay).await;

        if self.fail_scans.load(Ordering::SeqCst) {
            return Err(crate::Error::CommandFailed(
                "Simulated scan failure".to_string(),
            ));
        }

        tracing::info!("🤖 [MockBackend] Found {} networks.", self.networks.len());
        Ok(self.networks.clone())
    }

    async fn connect(&self, credentials: &Credentials) -> Result<()> {
        tracing::info!(
            ssid = %credentials.ssid,
            open = credentials.is_open(),
            "🤖 [MockBackend] Attempting to connect"
        );
        *self.last_connect.lock().await = Some(credentials.clone());
        // Simulate a connection delay
        sleep(self.connect_delay).await;

        // Simulate a failure for a specific network for testing purposes
        if credentials.ssid == FAILING_SSID {
            tracing::warn!(ssid = %credentials.ssid, "🤖 [MockBackend] Connection failed");
            Err(crate::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionAborted,
                "Simulated connection failure",
            )))
        } else {
            tracing::info!(ssid = %credentials.ssid, "🤖 [MockBackend] Connection successful");
            self.connected.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn exit_provisioning_mode(&self) -> Result<()> {
        tracing::info!("🤖 [MockBackend] Exiting provisioning mode (simulated).");
        Ok(())
    }
}

#[async_trait]
impl PolicyCheck for MockBackend {
    async fn is_connected(&self) -> Result<bool> {
        let connected = self.connected.load(Ordering::SeqCst);
        tracing::debug!(connected, "👻 [MockBackend] Checking connection status (simulated)");
        Ok(connected)
    }
}
