use crate::{Error, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Environment variable naming a TOML file that replaces the built-in config.
pub const CONFIG_ENV_VAR: &str = "PORTAL_CONFIG";

const DEFAULT_CONFIG_TOML: &str = include_str!("../../configs.toml");

// 内置的默认配置；解析失败时在首次使用时报告
static DEFAULT_APP_CONFIG: Lazy<Result<AppConfig>> =
    Lazy::new(|| load_config_from_toml_str(DEFAULT_CONFIG_TOML));

/// 顶层应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub portal: PortalConfig,
    pub ap: ApConfig,
}

/// Web 门户配置
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub bind_addr: SocketAddr,
    pub credentials_path: PathBuf,
    /// Delay between answering `/save` and switching networks, so the
    /// browser still receives the answer over the AP.
    pub apply_delay: Duration,
    pub scan_timeout: Duration,
}

/// AP 运行时配置
#[derive(Debug, Clone)]
pub struct ApConfig {
    pub ssid: String,
    pub psk: String,
    pub interface_name: String,
    pub gateway_cidr: String,
    pub dhcp_range: String,
    pub hostapd_conf_path: PathBuf,
    pub channel: u8,
    pub connect_timeout: Duration,
}

impl ApConfig {
    /// Gateway address without the prefix length, e.g. `192.168.4.1`.
    pub fn gateway_ip(&self) -> &str {
        self.gateway_cidr.split('/').next().unwrap_or("")
    }
}

/// 用于解析 TOML 的临时结构
#[derive(Deserialize)]
struct AppConfigFile {
    portal: PortalConfigToml,
    ap: ApConfigToml,
}

#[derive(Deserialize)]
struct PortalConfigToml {
    bind_addr: String,
    credentials_path: PathBuf,
    #[serde(default = "default_apply_delay_ms")]
    apply_delay_ms: u64,
    #[serde(default = "default_scan_timeout_secs")]
    scan_timeout_secs: u64,
}

#[derive(Deserialize)]
struct ApConfigToml {
    ssid: String,
    #[serde(default)]
    psk: String,
    interface_name: String,
    gateway_cidr: String,
    dhcp_range: String,
    hostapd_conf_path: PathBuf,
    #[serde(default = "default_channel")]
    channel: u8,
    #[serde(default = "default_connect_timeout_secs")]
    connect_timeout_secs: u64,
}

fn default_apply_delay_ms() -> u64 {
    1500
}

fn default_scan_timeout_secs() -> u64 {
    20
}

fn default_channel() -> u8 {
    6
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl TryFrom<PortalConfigToml> for PortalConfig {
    type Error = Error;

    fn try_from(t: PortalConfigToml) -> Result<Self> {
        let bind_addr = SocketAddr::from_str(&t.bind_addr)
            .map_err(|e| Error::InvalidConfig(format!("bind_addr '{}': {}", t.bind_addr, e)))?;
        Ok(PortalConfig {
            bind_addr,
            credentials_path: t.credentials_path,
            apply_delay: Duration::from_millis(t.apply_delay_ms),
            scan_timeout: Duration::from_secs(t.scan_timeout_secs),
        })
    }
}

impl TryFrom<ApConfigToml> for ApConfig {
    type Error = Error;

    fn try_from(t: ApConfigToml) -> Result<Self> {
        if t.ssid.is_empty() {
            return Err(Error::InvalidConfig("ap.ssid must not be empty".into()));
        }
        if !t.psk.is_empty() && !(8..=63).contains(&t.psk.chars().count()) {
            return Err(Error::InvalidConfig(
                "ap.psk must be empty (open AP) or 8 to 63 characters".into(),
            ));
        }
        if !t.gateway_cidr.contains('/') {
            return Err(Error::InvalidConfig(format!(
                "ap.gateway_cidr '{}' is missing a prefix length",
                t.gateway_cidr
            )));
        }
        Ok(ApConfig {
            ssid: t.ssid,
            psk: t.psk,
            interface_name: t.interface_name,
            gateway_cidr: t.gateway_cidr,
            dhcp_range: t.dhcp_range,
            hostapd_conf_path: t.hostapd_conf_path,
            channel: t.channel,
            connect_timeout: Duration::from_secs(t.connect_timeout_secs),
        })
    }
}

// ============= 配置加载函数 =============

/// 从 TOML 字符串加载应用配置
pub fn load_config_from_toml_str(s: &str) -> Result<AppConfig> {
    let parsed: AppConfigFile = toml::from_str(s)?;
    Ok(AppConfig {
        portal: parsed.portal.try_into()?,
        ap: parsed.ap.try_into()?,
    })
}

/// 从文件加载应用配置
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_toml_str(&content)
}

/// 内置的默认配置
pub fn default_config() -> Result<AppConfig> {
    match &*DEFAULT_APP_CONFIG {
        Ok(config) => Ok(config.clone()),
        Err(e) => Err(Error::InvalidConfig(format!("built-in configs.toml: {}", e))),
    }
}

/// 如果设置了 `PORTAL_CONFIG`，则从该文件加载，否则使用内置配置
pub fn load_config() -> Result<AppConfig> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) => {
            let path = PathBuf::from(path);
            tracing::info!(path = %path.display(), "Loading config from file");
            load_config_from_file(&path)
        }
        None => {
            tracing::debug!("Using built-in config");
            default_config()
        }
    }
}
