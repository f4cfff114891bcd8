use serde::{Deserialize, Serialize};
use std::fmt;

/// 802.11 limits the SSID to 32 octets.
pub const MAX_SSID_BYTES: usize = 32;
/// WPA2 passphrase bounds (in characters).
pub const MIN_PASSPHRASE_CHARS: usize = 8;
pub const MAX_PASSPHRASE_CHARS: usize = 63;

/// 扫描时单个网络的具体信息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub ssid: String,
    /// Signal strength in dBm, typically negative.
    pub rssi: i32,
}

impl Network {
    pub fn new(ssid: impl Into<String>, rssi: i32) -> Self {
        Self {
            ssid: ssid.into(),
            rssi,
        }
    }
}

/// `GET /scan` 的响应体
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResponse {
    // 缺失的 `networks` 字段等同于空列表
    #[serde(default)]
    pub networks: Vec<Network>,
}

/// `POST /save` 的请求体
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }

    /// Server-side checks applied before anything is persisted.
    ///
    /// Returns a message suitable for `SaveResult::message` on rejection.
    pub fn validate(&self) -> Result<(), String> {
        if self.ssid.trim().is_empty() {
            return Err("SSID is required".to_string());
        }
        if self.ssid.len() > MAX_SSID_BYTES {
            return Err(format!("SSID must be at most {} bytes", MAX_SSID_BYTES));
        }
        let chars = self.password.chars().count();
        if chars != 0 && !(MIN_PASSPHRASE_CHARS..=MAX_PASSPHRASE_CHARS).contains(&chars) {
            return Err(format!(
                "Password must be {} to {} characters",
                MIN_PASSPHRASE_CHARS, MAX_PASSPHRASE_CHARS
            ));
        }
        Ok(())
    }
}

// 日志中绝不输出密码
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field(
                "password",
                &if self.password.is_empty() { "(empty)" } else { "********" },
            )
            .finish()
    }
}

/// `POST /save` 的响应体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SaveResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_response_without_networks_is_empty() {
        let parsed: ScanResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.networks.is_empty());
    }

    #[test]
    fn save_result_omits_missing_message() {
        let json = serde_json::to_string(&SaveResult::ok()).unwrap();
        assert_eq!(json, r#"{"success":true}"#);

        let rejected: SaveResult =
            serde_json::from_str(r#"{"success":false,"message":"bad password"}"#).unwrap();
        assert_eq!(rejected.message.as_deref(), Some("bad password"));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("HomeNet", "hunter2hunter2");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("HomeNet"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn validation_rules() {
        assert!(Credentials::new("HomeNet", "").validate().is_ok());
        assert!(Credentials::new("HomeNet", "longenough").validate().is_ok());
        assert_eq!(
            Credentials::new("   ", "").validate(),
            Err("SSID is required".to_string())
        );
        assert!(Credentials::new("x".repeat(33), "").validate().is_err());
        assert!(Credentials::new("HomeNet", "short").validate().is_err());
        assert!(Credentials::new("HomeNet", "p".repeat(64)).validate().is_err());
    }

    #[test]
    fn password_defaults_to_empty() {
        let creds: Credentials = serde_json::from_str(r#"{"ssid":"Cafe"}"#).unwrap();
        assert!(creds.is_open());
    }
}
