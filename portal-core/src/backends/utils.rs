use crate::structs::Network;
use std::collections::HashMap;
use std::process::Output;
use tokio::process::Command;
use tracing::error;

/// 将 wpa_supplicant 输出中的 `\xHH` 转义序列反转义回原始字节。
/// 主要用于处理扫描结果中 SSID 字段中的汉字等非 ASCII 字符。
pub fn unescape_wpa_ssid(s: &str) -> Vec<u8> {
    fn hex_val(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(10 + b - b'a'),
            b'A'..=b'F' => Some(10 + b - b'A'),
            _ => None,
        }
    }

    let bs = s.as_bytes();
    let mut out = Vec::with_capacity(bs.len());
    let mut i = 0;
    while i < bs.len() {
        if bs[i] != b'\\' || i + 1 >= bs.len() {
            out.push(bs[i]);
            i += 1;
            continue;
        }
        match bs[i + 1] {
            b'x' | b'X' if i + 3 < bs.len() => {
                if let (Some(hi), Some(lo)) = (hex_val(bs[i + 2]), hex_val(bs[i + 3])) {
                    out.push((hi << 4) | lo);
                    i += 4;
                } else {
                    // 格式不正确，按字面量保留反斜杠
                    out.push(b'\\');
                    i += 1;
                }
            }
            b'\\' => {
                out.push(b'\\');
                i += 2;
            }
            b'"' => {
                out.push(b'"');
                i += 2;
            }
            _ => {
                out.push(b'\\');
                i += 1;
            }
        }
    }
    out
}

/// Parse `wpa_cli scan_results` output into a list of networks.
///
/// Format: bssid / frequency / signal level / flags / ssid.
/// Hidden networks are dropped, an SSID seen on several BSSIDs keeps its
/// strongest entry, and the list is sorted strongest first.
pub fn parse_scan_results(output: &str) -> Vec<Network> {
    let mut strongest: HashMap<String, i32> = HashMap::new();
    for line in output.lines() {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 5 {
            continue;
        }
        let Ok(rssi) = parts[2].trim().parse::<i32>() else {
            // 表头或无法解析的行
            continue;
        };

        let ssid_bytes = unescape_wpa_ssid(parts[4]);
        let ssid = String::from_utf8_lossy(&ssid_bytes).to_string();
        if ssid.is_empty() || ssid.chars().all(|c| c == '\0') {
            continue;
        }

        strongest
            .entry(ssid)
            .and_modify(|best| *best = (*best).max(rssi))
            .or_insert(rssi);
    }

    let mut networks: Vec<Network> = strongest
        .into_iter()
        .map(|(ssid, rssi)| Network { ssid, rssi })
        .collect();
    networks.sort_by(|a, b| b.rssi.cmp(&a.rssi).then_with(|| a.ssid.cmp(&b.ssid)));
    networks
}

/// 把 `wpa_cli status` 的输出解析成 `key=value` 查找
pub fn status_field<'a>(status: &'a str, key: &str) -> Option<&'a str> {
    status
        .lines()
        .filter_map(|line| line.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.trim())
}

// Helper: run a command and return Output; produce a unified Error::CommandFailed on failure
pub async fn run_cmd_output(mut cmd: Command, ctx: &str) -> crate::Result<Output> {
    match cmd.output().await {
        Ok(out) => {
            if !out.status.success() {
                let err = String::from_utf8_lossy(&out.stderr);
                error!(context = %ctx, stderr = %err, "command failed");
                return Err(crate::Error::CommandFailed(format!("{} failed: {}", ctx, err)));
            }
            Ok(out)
        }
        Err(e) => {
            error!(context = %ctx, error = %e, "failed to spawn command");
            Err(crate::Error::CommandFailed(format!("{} spawn failed: {}", ctx, e)))
        }
    }
}
