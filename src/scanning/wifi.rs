/// Active wifi scanning through NetworkManager's `nmcli`
use async_trait::async_trait;
use log::{debug, warn};
use tokio::process::Command;

use crate::error::CollectorError;
use crate::models::SignalSample;

// nmcli reports signal quality in percent; map it onto a dBm-like scale
const DBM_FLOOR: i32 = -100;

#[async_trait]
pub trait WifiScanner: Send + Sync {
    /// Trigger a fresh scan and return visible access points in driver order
    async fn rescan(&self) -> Result<Vec<SignalSample>, CollectorError>;
}

pub struct NmcliScanner {
    interface: Option<String>,
}

impl NmcliScanner {
    pub fn new(interface: Option<String>) -> Self {
        Self { interface }
    }
}

#[async_trait]
impl WifiScanner for NmcliScanner {
    async fn rescan(&self) -> Result<Vec<SignalSample>, CollectorError> {
        let mut command = Command::new("nmcli");
        command.args([
            "--terse",
            "--fields",
            "BSSID,SSID,SIGNAL",
            "device",
            "wifi",
            "list",
            "--rescan",
            "yes",
        ]);
        if let Some(interface) = &self.interface {
            command.args(["ifname", interface.as_str()]);
        }

        let output = command
            .output()
            .await
            .map_err(|e| CollectorError::ScanDriver(format!("failed to run nmcli: {}", e)))?;

        if !output.status.success() {
            return Err(CollectorError::ScanDriver(format!(
                "nmcli exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let samples = parse_nmcli_output(&String::from_utf8_lossy(&output.stdout));
        debug!("Scan returned {} access points", samples.len());
        Ok(samples)
    }
}

/// Convert signal quality (0-100 %) to an approximate level in dBm
pub fn percent_to_level(percent: u8) -> i32 {
    DBM_FLOOR + i32::from(percent.min(100)) / 2
}

/// Parse `BSSID:SSID:SIGNAL` lines of nmcli terse output
///
/// Colons inside fields are escaped as `\:` and backslashes as `\\`.
/// Malformed lines are skipped.
pub fn parse_nmcli_output(output: &str) -> Vec<SignalSample> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields = split_terse(line);
            match fields.as_slice() {
                [bssid, ssid, signal] if !bssid.is_empty() => match signal.trim().parse::<u8>() {
                    Ok(percent) => Some(SignalSample {
                        bssid: bssid.to_uppercase(),
                        ssid: ssid.clone(),
                        level: percent_to_level(percent),
                    }),
                    Err(_) => {
                        warn!("Invalid signal value in scan line: '{}'", line);
                        None
                    }
                },
                _ => {
                    warn!("Unexpected scan line: '{}'", line);
                    None
                }
            }
        })
        .collect()
}

fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
