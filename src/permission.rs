use async_trait::async_trait;
use log::{info, warn};

#[async_trait]
pub trait PermissionService: Send + Sync {
    /// Ask for location access, which wifi scanning needs. Any failure counts as denied.
    async fn request_location_permission(&self) -> bool;
}

/// Permission decided by the `LOCATION_PERMISSION` setting
pub struct ConfiguredPermission {
    setting: Option<String>,
}

impl ConfiguredPermission {
    pub fn new(setting: Option<String>) -> Self {
        Self { setting }
    }
}

#[async_trait]
impl PermissionService for ConfiguredPermission {
    async fn request_location_permission(&self) -> bool {
        let granted = match self.setting.as_deref().map(|s| s.trim().to_lowercase()) {
            None => true,
            Some(value) => match value.as_str() {
                "granted" | "true" | "yes" | "1" => true,
                "denied" | "false" | "no" | "0" => false,
                other => {
                    warn!("Unrecognized LOCATION_PERMISSION '{}', treating as denied", other);
                    false
                }
            },
        };

        info!(
            "Location permission {}",
            if granted { "granted" } else { "denied" }
        );
        granted
    }
}
