// 基于 hostapd + dnsmasq (AP) 和 wpa_cli (STA) 的后端
use super::utils::{parse_scan_results, run_cmd_output, status_field};
use crate::config::ApConfig;
use crate::structs::{Credentials, Network};
use crate::traits::{PolicyCheck, WifiBackend};
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SCAN_POLL_INTERVAL: Duration = Duration::from_secs(2);
const SCAN_POLL_ATTEMPTS: usize = 5;
const CONNECT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectProgress {
    Pending,
    Connected,
    KeyRejected,
}

/// 跟踪连续几次 `wpa_cli status` 的 wpa_state。
///
/// `status` 里没有失败原因；握手之后又回到 DISCONNECTED/SCANNING 说明密码被拒绝。
#[derive(Debug, Default)]
struct HandshakeWatch {
    saw_handshake: bool,
}

impl HandshakeWatch {
    fn observe(&mut self, wpa_state: Option<&str>) -> ConnectProgress {
        match wpa_state {
            Some("COMPLETED") => ConnectProgress::Connected,
            Some("4WAY_HANDSHAKE" | "GROUP_HANDSHAKE") => {
                self.saw_handshake = true;
                ConnectProgress::Pending
            }
            Some("DISCONNECTED" | "SCANNING" | "INACTIVE") if self.saw_handshake => {
                ConnectProgress::KeyRejected
            }
            _ => ConnectProgress::Pending,
        }
    }
}

/// 使用 hostapd 提供热点、dnsmasq 提供 DHCP/DNS 劫持、wpa_cli 负责扫描和连接。
#[derive(Debug)]
pub struct WpaCliBackend {
    ap_config: Arc<ApConfig>,
    wpa_cli_program: PathBuf,
    hostapd: Mutex<Option<Child>>,
    dnsmasq: Mutex<Option<Child>>,
}

impl WpaCliBackend {
    pub fn new(ap_config: ApConfig) -> Self {
        Self {
            ap_config: Arc::new(ap_config),
            wpa_cli_program: PathBuf::from("wpa_cli"),
            hostapd: Mutex::new(None),
            dnsmasq: Mutex::new(None),
        }
    }

    /// Uses another `wpa_cli` executable, e.g. one outside `$PATH`.
    pub fn with_wpa_cli(mut self, program: impl Into<PathBuf>) -> Self {
        self.wpa_cli_program = program.into();
        self
    }

    pub fn ap_config(&self) -> Arc<ApConfig> {
        self.ap_config.clone()
    }

    fn wpa_cli(&self) -> Command {
        let mut cmd = Command::new(&self.wpa_cli_program);
        cmd.arg("-i").arg(&self.ap_config.interface_name);
        cmd
    }

    /// 运行一条 wpa_cli 命令并返回其标准输出；`FAIL` 回复视为错误
    async fn wpa_cli_cmd(&self, args: &[&str]) -> Result<String> {
        let mut cmd = self.wpa_cli();
        cmd.args(args);
        let ctx = format!("wpa_cli {}", args.first().copied().unwrap_or_default());
        let out = run_cmd_output(cmd, &ctx).await?;
        let stdout = String::from_utf8(out.stdout)?;
        if stdout.trim() == "FAIL" {
            return Err(Error::CommandFailed(format!("{} replied FAIL", ctx)));
        }
        Ok(stdout)
    }

    async fn configure_network(&self, network_id: u32, credentials: &Credentials) -> Result<()> {
        let id = network_id.to_string();
        let ssid_arg = format!("\"{}\"", credentials.ssid);
        self.wpa_cli_cmd(&["set_network", &id, "ssid", &ssid_arg]).await?;
        if credentials.is_open() {
            self.wpa_cli_cmd(&["set_network", &id, "key_mgmt", "NONE"]).await?;
        } else {
            let psk_arg = format!("\"{}\"", credentials.password);
            self.wpa_cli_cmd(&["set_network", &id, "psk", &psk_arg]).await?;
        }
        self.wpa_cli_cmd(&["select_network", &id]).await?;
        Ok(())
    }

    async fn remove_network(&self, network_id: u32) {
        let id = network_id.to_string();
        if let Err(e) = self.wpa_cli_cmd(&["remove_network", &id]).await {
            warn!(network_id, error = %e, "Failed to remove network");
        }
    }

    async fn run_dhcp_client(&self) {
        info!("Attempting to run DHCP client (udhcpc)...");
        let status = Command::new("udhcpc")
            .arg("-i")
            .arg(&self.ap_config.interface_name)
            .arg("-q") // 获取 IP 后立即退出
            .arg("-n")
            .status()
            .await;
        match status {
            Ok(s) if s.success() => info!("DHCP client obtained an IP."),
            Ok(_) => warn!("DHCP client (udhcpc) exited with an error."),
            Err(e) => warn!(error = %e, "Failed to execute 'udhcpc'. Is it installed on this board?"),
        }
    }
}

/// 生成 hostapd 配置文件内容
pub fn hostapd_config(ap: &ApConfig) -> String {
    let mut conf = format!(
        "interface={}\ndriver=nl80211\nssid={}\nhw_mode=g\nchannel={}\n",
        ap.interface_name, ap.ssid, ap.channel
    );
    if !ap.psk.is_empty() {
        conf.push_str("wpa=2\nwpa_key_mgmt=WPA-PSK\nrsn_pairwise=CCMP\n");
        conf.push_str(&format!("wpa_passphrase={}\n", ap.psk));
    }
    conf
}

/// dnsmasq 参数：DHCP 服务，并把所有域名解析到网关，实现强制门户
pub fn dnsmasq_args(ap: &ApConfig) -> Vec<String> {
    vec![
        format!("--interface={}", ap.interface_name),
        format!("--dhcp-range={}", ap.dhcp_range),
        format!("--address=/#/{}", ap.gateway_ip()),
        "--no-resolv".to_string(),
        "--no-hosts".to_string(),
        "--no-daemon".to_string(),
    ]
}

#[async_trait]
impl WifiBackend for WpaCliBackend {
    async fn enter_provisioning_mode(&self) -> Result<()> {
        let ap = &self.ap_config;
        info!(ssid = %ap.ssid, iface = %ap.interface_name, "📡 [WpaCli] Entering provisioning mode...");

        // 1. 断开 STA 连接，避免与 hostapd 争抢接口
        let _ = self.wpa_cli().arg("disconnect").output().await;

        // 2. 设置 IP
        let output = Command::new("ip")
            .args(["addr", "add", ap.gateway_cidr.as_str(), "dev", ap.interface_name.as_str()])
            .output()
            .await?;
        if !output.status.success() {
            let error_msg = String::from_utf8_lossy(&output.stderr);
            if !error_msg.contains("File exists") {
                return Err(Error::CommandFailed(format!(
                    "Failed to set IP address: {}",
                    error_msg
                )));
            }
        }

        // 3. 启动 hostapd
        tokio::fs::write(&ap.hostapd_conf_path, hostapd_config(ap)).await?;
        let hostapd = Command::new("hostapd")
            .arg(&ap.hostapd_conf_path)
            .kill_on_drop(true)
            .spawn()?;
        *self.hostapd.lock().await = Some(hostapd);

        // 4. 启动 dnsmasq
        let dnsmasq = Command::new("dnsmasq")
            .args(dnsmasq_args(ap))
            .kill_on_drop(true)
            .spawn()?;
        *self.dnsmasq.lock().await = Some(dnsmasq);

        info!("📡 [WpaCli] AP started on {}", ap.interface_name);
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<Network>> {
        debug!("📡 [WpaCli] Triggering scan...");
        match self.wpa_cli_cmd(&["scan"]).await {
            Ok(reply) if reply.trim() == "FAIL-BUSY" => {
                debug!("Scan already in progress, waiting for its results");
            }
            Ok(_) => {}
            Err(e) => return Err(e),
        }

        let mut networks = Vec::new();
        for attempt in 1..=SCAN_POLL_ATTEMPTS {
            tokio::time::sleep(SCAN_POLL_INTERVAL).await;
            let stdout = self.wpa_cli_cmd(&["scan_results"]).await?;
            networks = parse_scan_results(&stdout);
            if !networks.is_empty() {
                break;
            }
            debug!(attempt, "Scan results still empty");
        }

        info!("📡 [WpaCli] Scan complete, found {} networks.", networks.len());
        Ok(networks)
    }

    // 调用方负责先退出配网模式 (AP 与 STA 不能同时占用接口)
    async fn connect(&self, credentials: &Credentials) -> Result<()> {
        // 1. 配置网络
        let reply = self.wpa_cli_cmd(&["add_network"]).await?;
        let network_id: u32 = reply.trim().parse().map_err(|_| {
            Error::CommandFailed(format!("Failed to parse network ID from wpa_cli: {}", reply))
        })?;
        if let Err(e) = self.configure_network(network_id, credentials).await {
            self.remove_network(network_id).await;
            return Err(e);
        }

        // 2. 轮询连接状态
        info!(ssid = %credentials.ssid, "📡 [WpaCli] Connecting... Polling status.");
        let mut handshake = HandshakeWatch::default();
        let deadline = tokio::time::Instant::now() + self.ap_config.connect_timeout;
        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(CONNECT_POLL_INTERVAL).await;
            let status = match self.wpa_cli_cmd(&["status"]).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "Failed to get status, retrying");
                    continue;
                }
            };

            let state = status_field(&status, "wpa_state");
            match handshake.observe(state) {
                ConnectProgress::Connected => {
                    info!(ssid = %credentials.ssid, "📡 [WpaCli] Connection successful (COMPLETED).");
                    if let Err(e) = self.wpa_cli_cmd(&["save_config"]).await {
                        warn!(error = %e, "save_config failed; network will not survive a wpa_supplicant restart");
                    }
                    self.run_dhcp_client().await;
                    return Ok(());
                }
                ConnectProgress::KeyRejected if !credentials.is_open() => {
                    warn!(ssid = %credentials.ssid, "Connection failed: handshake rejected (WRONG_KEY)");
                    self.remove_network(network_id).await;
                    return Err(Error::CommandFailed("Invalid password".into()));
                }
                _ => debug!(state = state.unwrap_or("<missing>"), "Connection in progress"),
            }
        }

        warn!(ssid = %credentials.ssid, "Connection timed out");
        self.remove_network(network_id).await;
        Err(Error::Timeout(format!("connecting to '{}'", credentials.ssid)))
    }

    async fn exit_provisioning_mode(&self) -> Result<()> {
        info!("📡 [WpaCli] Exiting provisioning mode...");
        if let Some(mut child) = self.dnsmasq.lock().await.take() {
            let _ = child.kill().await;
        }
        if let Some(mut child) = self.hostapd.lock().await.take() {
            let _ = child.kill().await;
        }

        let ap = &self.ap_config;
        let output = Command::new("ip")
            .args(["addr", "del", ap.gateway_cidr.as_str(), "dev", ap.interface_name.as_str()])
            .output()
            .await?;
        if !output.status.success() {
            let error_msg = String::from_utf8_lossy(&output.stderr);
            if !error_msg.contains("Cannot assign requested address") {
                return Err(Error::CommandFailed(format!(
                    "Failed to clean up IP address: {}",
                    error_msg
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PolicyCheck for WpaCliBackend {
    async fn is_connected(&self) -> Result<bool> {
        let status = match self.wpa_cli_cmd(&["status"]).await {
            Ok(s) => s,
            Err(e) => {
                // wpa_supplicant 未运行时视为未连接
                warn!(error = %e, "wpa_cli status failed, assuming NOT connected");
                return Ok(false);
            }
        };
        let connected = status_field(&status, "wpa_state") == Some("COMPLETED")
            && status_field(&status, "ip_address").is_some();
        debug!(connected, "Checked connection status");
        Ok(connected)
    }
}
