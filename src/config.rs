use log::info;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub tls_insecure: bool,
    pub max_retries: usize,
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub database: DatabaseConfig,
    pub wifi_scan_interval_ms: u64,
    pub magnetometer_interval_ms: u64,
    pub wifi_interface: Option<String>,
    pub magnetometer_device: Option<PathBuf>,
    pub location_permission: Option<String>,
    pub state_file: Option<PathBuf>,
}

impl CollectorConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL environment variable not set")?;

        let config = CollectorConfig {
            database: DatabaseConfig {
                url,
                tls_insecure: parse_var("DATABASE_TLS_INSECURE", false)?,
                max_retries: parse_var("UPLOAD_MAX_RETRIES", 3)?,
                retry_delay_secs: parse_var("UPLOAD_RETRY_DELAY_SECS", 5)?,
            },
            wifi_scan_interval_ms: parse_var("WIFI_SCAN_INTERVAL_MS", 500)?,
            magnetometer_interval_ms: parse_var("MAGNETOMETER_INTERVAL_MS", 500)?,
            wifi_interface: non_empty_var("WIFI_INTERFACE"),
            magnetometer_device: non_empty_var("MAGNETOMETER_DEVICE").map(PathBuf::from),
            location_permission: non_empty_var("LOCATION_PERMISSION"),
            state_file: non_empty_var("STATE_FILE").map(PathBuf::from),
        };

        if config.database.max_retries == 0 {
            return Err("UPLOAD_MAX_RETRIES must be at least 1".into());
        }
        if config.wifi_scan_interval_ms == 0 || config.magnetometer_interval_ms == 0 {
            return Err("Scan intervals must be greater than zero".into());
        }

        info!(
            "Scan interval {} ms, magnetometer interval {} ms",
            config.wifi_scan_interval_ms, config.magnetometer_interval_ms
        );

        Ok(config)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, String> {
    match non_empty_var(key) {
        Some(value) => parse_value(key, &value),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid value for {}: '{}'", key, value))
}
