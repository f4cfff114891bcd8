use super::http::ClientError;
use crate::structs::{Credentials, Network, SaveResult};
use thiserror::Error;

/// Error banner text when the portal gives no better explanation.
pub const GENERIC_ERROR: &str = "Something went wrong. Please try again.";
/// Single placeholder row shown when a scan finds nothing.
pub const NOT_FOUND_LABEL: &str = "No networks found";

const SCAN_IDLE_LABEL: &str = "Scan for networks";
const SCAN_BUSY_LABEL: &str = "Scanning...";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UiError {
    #[error("a scan is already in progress")]
    ScanInProgress,

    #[error("a save request is already in progress")]
    SaveInProgress,

    #[error("SSID is required")]
    EmptySsid,

    #[error("no network row at index {0}")]
    NoSuchNetwork(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
}

/// One selectable row of the network list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRow {
    pub ssid: String,
    pub rssi: i32,
}

impl NetworkRow {
    pub fn signal_label(&self) -> String {
        format!("{} dBm", self.rssi)
    }
}

impl From<Network> for NetworkRow {
    fn from(n: Network) -> Self {
        Self {
            ssid: n.ssid,
            rssi: n.rssi,
        }
    }
}

/// What the network list area shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListView {
    /// No scan has completed yet.
    Hidden,
    Rows(Vec<NetworkRow>),
    /// The last scan returned no networks: one non-selectable placeholder.
    NotFound,
}

impl ListView {
    /// Number of rows on screen, placeholder included.
    pub fn row_count(&self) -> usize {
        match self {
            ListView::Hidden => 0,
            ListView::Rows(rows) => rows.len(),
            ListView::NotFound => 1,
        }
    }
}

/// Terminal outcome of a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    None,
    Success,
    Error(String),
}

/// Flattened snapshot of everything the page displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView {
    pub scan_label: &'static str,
    pub scan_enabled: bool,
    pub scan_notice: Option<String>,
    pub list: ListView,
    pub ssid: String,
    pub submit_enabled: bool,
    pub success_visible: bool,
    pub error_text: Option<String>,
}

/// State of the provisioning page.
///
/// Event handlers (`begin_*`, `finish_*`, `select_network`, setters) are
/// the only way to change it; [`PortalUi::view`] renders it.
#[derive(Debug, Clone)]
pub struct PortalUi {
    scan: ScanState,
    saving: bool,
    list: ListView,
    scan_error: Option<String>,
    ssid: String,
    password: String,
    banner: Banner,
}

impl Default for PortalUi {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalUi {
    pub fn new() -> Self {
        Self {
            scan: ScanState::Idle,
            saving: false,
            list: ListView::Hidden,
            scan_error: None,
            ssid: String::new(),
            password: String::new(),
            banner: Banner::None,
        }
    }

    // --- scan ---

    /// Disables the scan control. Refused while a scan is already pending.
    pub fn begin_scan(&mut self) -> Result<(), UiError> {
        if self.scan == ScanState::Scanning {
            return Err(UiError::ScanInProgress);
        }
        self.scan = ScanState::Scanning;
        self.scan_error = None;
        Ok(())
    }

    /// Applies a scan outcome and re-enables the control.
    ///
    /// A failed scan keeps the previous list and records a notice instead of
    /// failing silently.
    pub fn finish_scan(&mut self, outcome: Result<Vec<Network>, ClientError>) {
        self.scan = ScanState::Idle;
        match outcome {
            Ok(networks) if networks.is_empty() => self.list = ListView::NotFound,
            Ok(networks) => {
                self.list = ListView::Rows(networks.into_iter().map(NetworkRow::from).collect());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Scan failed");
                self.scan_error = Some(format!("Scan failed: {}", e));
            }
        }
    }

    /// The pending scan was abandoned; back to idle, list untouched.
    pub fn cancel_scan(&mut self) {
        self.scan = ScanState::Idle;
    }

    /// Copies the SSID of row `index` into the SSID field. The password is
    /// left as typed.
    pub fn select_network(&mut self, index: usize) -> Result<(), UiError> {
        let ListView::Rows(rows) = &self.list else {
            return Err(UiError::NoSuchNetwork(index));
        };
        let row = rows.get(index).ok_or(UiError::NoSuchNetwork(index))?;
        self.ssid = row.ssid.clone();
        Ok(())
    }

    // --- form ---

    pub fn set_ssid(&mut self, ssid: impl Into<String>) {
        self.ssid = ssid.into();
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    /// Required-field check, then hands out the payload to send.
    /// Nothing is sent when this returns an error.
    pub fn begin_save(&mut self) -> Result<Credentials, UiError> {
        if self.saving {
            return Err(UiError::SaveInProgress);
        }
        if self.ssid.is_empty() {
            return Err(UiError::EmptySsid);
        }
        self.saving = true;
        Ok(Credentials::new(self.ssid.clone(), self.password.clone()))
    }

    pub fn finish_save(&mut self, outcome: Result<SaveResult, ClientError>) {
        self.saving = false;
        self.banner = match outcome {
            Ok(SaveResult { success: true, .. }) => Banner::Success,
            Ok(SaveResult { message, .. }) => Banner::Error(
                message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| GENERIC_ERROR.to_string()),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Save request failed");
                Banner::Error(GENERIC_ERROR.to_string())
            }
        };
    }

    pub fn cancel_save(&mut self) {
        self.saving = false;
    }

    // --- accessors ---

    pub fn scan_state(&self) -> ScanState {
        self.scan
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn list(&self) -> &ListView {
        &self.list
    }

    pub fn scan_error(&self) -> Option<&str> {
        self.scan_error.as_deref()
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn banner(&self) -> &Banner {
        &self.banner
    }

    pub fn view(&self) -> PageView {
        let scanning = self.scan == ScanState::Scanning;
        PageView {
            scan_label: if scanning { SCAN_BUSY_LABEL } else { SCAN_IDLE_LABEL },
            scan_enabled: !scanning,
            scan_notice: self.scan_error.clone(),
            list: self.list.clone(),
            ssid: self.ssid.clone(),
            submit_enabled: !self.saving,
            success_visible: self.banner == Banner::Success,
            error_text: match &self.banner {
                Banner::Error(text) => Some(text.clone()),
                _ => None,
            },
        }
    }
}
