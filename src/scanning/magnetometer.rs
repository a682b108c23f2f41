/// Magnetometer readings from the Linux IIO subsystem
use futures_util::stream::{self, BoxStream, StreamExt};
use log::{debug, info};
use std::path::{Path, PathBuf};
use tokio::time::{Duration, MissedTickBehavior};

use crate::error::CollectorError;
use crate::models::OrientationSample;

const IIO_DEVICES_DIR: &str = "/sys/bus/iio/devices";

pub trait OrientationSensor: Send + Sync {
    /// Push readings at roughly `interval` until the stream is dropped
    fn subscribe(
        &self,
        interval: Duration,
    ) -> Result<BoxStream<'static, OrientationSample>, CollectorError>;
}

pub struct IioMagnetometer {
    device: Option<PathBuf>,
}

impl IioMagnetometer {
    /// Use `device` if given, otherwise look for the first IIO device exposing magnetometer channels
    pub fn new(device: Option<PathBuf>) -> Self {
        Self { device }
    }

    fn resolve_device(&self) -> Result<PathBuf, CollectorError> {
        if let Some(device) = &self.device {
            return if is_magnetometer(device) {
                Ok(device.clone())
            } else {
                Err(CollectorError::Sensor(format!(
                    "{} has no magnetometer channels",
                    device.display()
                )))
            };
        }

        let entries = std::fs::read_dir(IIO_DEVICES_DIR)
            .map_err(|e| CollectorError::Sensor(format!("{}: {}", IIO_DEVICES_DIR, e)))?;

        entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .find(|path| is_magnetometer(path))
            .ok_or_else(|| CollectorError::Sensor("no IIO magnetometer found".to_string()))
    }
}

impl OrientationSensor for IioMagnetometer {
    fn subscribe(
        &self,
        interval: Duration,
    ) -> Result<BoxStream<'static, OrientationSample>, CollectorError> {
        let device = self.resolve_device()?;
        info!("Subscribing to magnetometer at {}", device.display());

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let readings = stream::unfold((ticker, device), |(mut ticker, device)| async move {
            loop {
                ticker.tick().await;
                match read_sample(&device).await {
                    Ok(sample) => return Some((sample, (ticker, device))),
                    Err(e) => debug!("Skipping magnetometer reading: {}", e),
                }
            }
        });

        Ok(readings.boxed())
    }
}

fn is_magnetometer(device: &Path) -> bool {
    device.join("in_magn_x_raw").exists()
}

async fn read_sample(device: &Path) -> Result<OrientationSample, CollectorError> {
    let shared_scale = read_number(&device.join("in_magn_scale")).await.ok();

    let mut axes = [0.0f64; 3];
    for (value, axis) in axes.iter_mut().zip(["x", "y", "z"]) {
        let raw = read_number(&device.join(format!("in_magn_{}_raw", axis))).await?;
        let scale = match shared_scale {
            Some(scale) => scale,
            None => read_number(&device.join(format!("in_magn_{}_scale", axis)))
                .await
                .unwrap_or(1.0),
        };
        *value = raw * scale;
    }

    Ok(OrientationSample {
        x: axes[0],
        y: axes[1],
        z: axes[2],
    })
}

async fn read_number(path: &Path) -> Result<f64, CollectorError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CollectorError::Sensor(format!("{}: {}", path.display(), e)))?;
    contents.trim().parse().map_err(|_| {
        CollectorError::Sensor(format!(
            "invalid value '{}' in {}",
            contents.trim(),
            path.display()
        ))
    })
}
