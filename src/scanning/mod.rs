pub mod magnetometer;
pub mod producer;
pub mod wifi;

pub use magnetometer::{IioMagnetometer, OrientationSensor};
pub use producer::{forward_orientation, scan_loop, SampleEvent};
pub use wifi::{NmcliScanner, WifiScanner};
