/// Folding of wifi scans and magnetometer readings into per-room buffers
use log::{debug, info};

use crate::models::{
    OrientationSample, RoomBuffer, RoomKey, SessionBuffer, SignalSample, TrainingFrame,
};

/// Read-only view of the aggregator for the operator console
#[derive(Debug, Clone, PartialEq)]
pub struct LiveStatus {
    pub scanning: bool,
    pub active_room: RoomKey,
    pub session_id: Option<String>,
    pub top_signal: Option<SignalSample>,
    pub top_orientation: Option<OrientationSample>,
    pub signal_counts: Vec<(RoomKey, usize)>,
    pub orientation_counts: Vec<(RoomKey, usize)>,
    pub frames: usize,
}

/// Owns the session buffer. All mutation goes through these methods, and the
/// collector calls them from a single task, so no locking happens here.
#[derive(Debug, Default)]
pub struct SampleAggregator {
    buffer: SessionBuffer,
}

impl SampleAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_scanning(&self) -> bool {
        self.buffer.scanning
    }

    pub fn active_room(&self) -> RoomKey {
        self.buffer.active_room
    }

    pub fn session_id(&self) -> Option<&str> {
        self.buffer.session_id.as_deref()
    }

    /// Enter the scanning state. Returns false and stays idle when the
    /// location permission has not been granted.
    pub fn start_scanning(&mut self, permission_granted: bool) -> bool {
        if !permission_granted {
            return false;
        }
        self.buffer.scanning = true;
        info!("Scanning started in {}", self.buffer.active_room);
        true
    }

    pub fn stop_scanning(&mut self) {
        if self.buffer.scanning {
            info!("Scanning stopped");
        }
        self.buffer.scanning = false;
    }

    /// Attribute subsequent samples to `room`, including ones already in flight
    pub fn set_active_room(&mut self, room: RoomKey) {
        self.buffer.active_room = room;
    }

    pub fn set_session_id(&mut self, session_id: Option<String>) {
        self.buffer.session_id = session_id;
    }

    /// Append one successful scan result to the active room
    ///
    /// Every result adds a training frame, even one with no access points.
    /// The top signal becomes the first sample of the result as delivered by
    /// the driver. Results are not re-sorted by level.
    pub fn on_signal_scan_result(&mut self, samples: &[SignalSample]) {
        if !self.buffer.scanning {
            debug!("Dropping scan result of {} samples while idle", samples.len());
            return;
        }

        let room = self.buffer.active_room;
        let room_buffer = self.buffer.rooms.entry(room).or_default();
        for sample in samples {
            let trace = room_buffer
                .wifi_data
                .entry(sample.bssid.clone())
                .or_default();
            trace.levels.push(sample.level);
            trace.ssid = sample.ssid.clone();
        }

        self.buffer.frames.push(TrainingFrame::new(samples, room));
        if let Some(first) = samples.first() {
            self.buffer.top_signal = Some(first.clone());
        }
        debug!("Recorded {} access points in {}", samples.len(), room);
    }

    pub fn on_orientation_sample(&mut self, sample: OrientationSample) {
        if !self.buffer.scanning {
            return;
        }

        let room = self.buffer.active_room;
        self.buffer
            .rooms
            .entry(room)
            .or_default()
            .magnet_data
            .push(sample);
        self.buffer.top_orientation = Some(sample);
    }

    /// Snapshot of the buffer with every known room present
    pub fn export_for_upload(&self) -> SessionBuffer {
        let mut snapshot = self.buffer.clone();
        for room in RoomKey::ALL {
            snapshot.rooms.entry(room).or_insert_with(RoomBuffer::default);
        }
        snapshot
    }

    /// Drop all collected samples. Session identifier and active room are kept.
    pub fn reset(&mut self) {
        let session_id = self.buffer.session_id.take();
        let active_room = self.buffer.active_room;
        let scanning = self.buffer.scanning;
        self.buffer = SessionBuffer {
            session_id,
            active_room,
            scanning,
            ..SessionBuffer::default()
        };
        info!("Session buffer cleared");
    }

    pub fn status(&self) -> LiveStatus {
        let count_for = |room: RoomKey, f: fn(&RoomBuffer) -> usize| {
            self.buffer.room(room).map(f).unwrap_or(0)
        };

        LiveStatus {
            scanning: self.buffer.scanning,
            active_room: self.buffer.active_room,
            session_id: self.buffer.session_id.clone(),
            top_signal: self.buffer.top_signal.clone(),
            top_orientation: self.buffer.top_orientation,
            signal_counts: RoomKey::ALL
                .iter()
                .map(|room| (*room, count_for(*room, |b| b.wifi_data.len())))
                .collect(),
            orientation_counts: RoomKey::ALL
                .iter()
                .map(|room| (*room, count_for(*room, |b| b.magnet_data.len())))
                .collect(),
            frames: self.buffer.frames.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(bssid: &str, ssid: &str, level: i32) -> SignalSample {
        SignalSample {
            bssid: bssid.to_string(),
            ssid: ssid.to_string(),
            level,
        }
    }

    fn scanning_in(room: RoomKey) -> SampleAggregator {
        let mut aggregator = SampleAggregator::new();
        aggregator.set_active_room(room);
        assert!(aggregator.start_scanning(true));
        aggregator
    }

    #[test]
    fn test_level_sequence_follows_appearances() {
        let mut aggregator = scanning_in(RoomKey::Kitchen);
        aggregator.on_signal_scan_result(&[sample("a", "net", -50), sample("b", "other", -70)]);
        aggregator.on_signal_scan_result(&[sample("a", "net", -52)]);
        aggregator.on_signal_scan_result(&[sample("b", "other", -71), sample("a", "net", -55)]);

        let export = aggregator.export_for_upload();
        let kitchen = export.room(RoomKey::Kitchen).unwrap();
        assert_eq!(kitchen.wifi_data["a"].levels, vec![-50, -52, -55]);
        // uneven lengths are kept as is
        assert_eq!(kitchen.wifi_data["b"].levels, vec![-70, -71]);
    }

    #[test]
    fn test_ssid_overwritten_with_latest() {
        let mut aggregator = scanning_in(RoomKey::Bedroom);
        aggregator.on_signal_scan_result(&[sample("a", "old-name", -40)]);
        aggregator.on_signal_scan_result(&[sample("a", "new-name", -41)]);

        let export = aggregator.export_for_upload();
        assert_eq!(export.room(RoomKey::Bedroom).unwrap().wifi_data["a"].ssid, "new-name");
    }

    #[test]
    fn test_room_switch_partitions_samples() {
        let mut aggregator = scanning_in(RoomKey::Kitchen);
        aggregator.on_signal_scan_result(&[sample("a", "net", -50)]);
        aggregator.set_active_room(RoomKey::Bedroom);
        aggregator.on_signal_scan_result(&[sample("a", "net", -60)]);
        aggregator.stop_scanning();

        let export = aggregator.export_for_upload();
        assert_eq!(export.room(RoomKey::Kitchen).unwrap().wifi_data["a"].levels, vec![-50]);
        assert_eq!(export.room(RoomKey::Bedroom).unwrap().wifi_data["a"].levels, vec![-60]);
        assert!(export.room(RoomKey::LivingRoom).unwrap().is_empty());
    }

    #[test]
    fn test_nothing_recorded_after_stop() {
        let mut aggregator = scanning_in(RoomKey::LivingRoom);
        aggregator.on_signal_scan_result(&[sample("a", "net", -50)]);
        aggregator.on_orientation_sample(OrientationSample { x: 1.0, y: 1.0, z: 1.0 });
        aggregator.stop_scanning();
        let before = aggregator.export_for_upload();

        aggregator.on_signal_scan_result(&[sample("a", "net", -10), sample("c", "x", -20)]);
        aggregator.on_orientation_sample(OrientationSample { x: 9.0, y: 9.0, z: 9.0 });

        assert_eq!(aggregator.export_for_upload(), before);
    }

    #[test]
    fn test_empty_export_has_every_room() {
        let aggregator = SampleAggregator::new();
        let export = aggregator.export_for_upload();

        assert_eq!(export.rooms.len(), RoomKey::ALL.len());
        for room in RoomKey::ALL {
            assert!(export.room(room).unwrap().is_empty());
        }
        assert!(export.frames.is_empty());
        assert!(export.top_signal.is_none());
    }

    #[test]
    fn test_orientation_only_while_scanning() {
        let point = OrientationSample { x: 1.0, y: 2.0, z: 3.0 };

        let mut aggregator = scanning_in(RoomKey::LivingRoom);
        aggregator.on_orientation_sample(point);
        let export = aggregator.export_for_upload();
        assert_eq!(export.room(RoomKey::LivingRoom).unwrap().magnet_data, vec![point]);
        assert_eq!(export.top_orientation, Some(point));

        let mut idle = SampleAggregator::new();
        idle.on_orientation_sample(point);
        let export = idle.export_for_upload();
        assert!(export.room(RoomKey::LivingRoom).unwrap().magnet_data.is_empty());
        assert!(export.top_orientation.is_none());
    }

    #[test]
    fn test_top_signal_is_first_not_strongest() {
        let mut aggregator = scanning_in(RoomKey::Kitchen);
        aggregator.on_signal_scan_result(&[sample("weak", "w", -90), sample("strong", "s", -30)]);
        assert_eq!(aggregator.status().top_signal, Some(sample("weak", "w", -90)));

        // an empty result leaves the previous top signal in place
        aggregator.on_signal_scan_result(&[]);
        assert_eq!(aggregator.status().top_signal, Some(sample("weak", "w", -90)));
    }

    #[test]
    fn test_empty_scan_records_frame_without_levels() {
        let mut aggregator = scanning_in(RoomKey::Kitchen);
        aggregator.on_signal_scan_result(&[]);

        let export = aggregator.export_for_upload();
        assert_eq!(export.frames.len(), 1);
        assert!(export.frames[0].input.is_empty());
        assert_eq!(export.frames[0].output.get(&RoomKey::Kitchen), Some(&1));
        assert!(export.room(RoomKey::Kitchen).unwrap().wifi_data.is_empty());
        assert!(export.top_signal.is_none());
    }

    #[test]
    fn test_start_requires_permission() {
        let mut aggregator = SampleAggregator::new();
        assert!(!aggregator.start_scanning(false));
        assert!(!aggregator.is_scanning());

        aggregator.on_signal_scan_result(&[sample("a", "net", -50)]);
        assert!(aggregator.export_for_upload().frames.is_empty());
    }

    #[test]
    fn test_buffer_survives_restart_and_reset_clears_it() {
        let mut aggregator = scanning_in(RoomKey::Kitchen);
        aggregator.set_session_id(Some("flat-1".to_string()));
        aggregator.on_signal_scan_result(&[sample("a", "net", -50)]);
        aggregator.stop_scanning();
        aggregator.start_scanning(true);
        aggregator.on_signal_scan_result(&[sample("a", "net", -51)]);

        let export = aggregator.export_for_upload();
        assert_eq!(export.room(RoomKey::Kitchen).unwrap().wifi_data["a"].levels, vec![-50, -51]);

        aggregator.reset();
        let export = aggregator.export_for_upload();
        assert!(export.room(RoomKey::Kitchen).unwrap().is_empty());
        assert!(export.frames.is_empty());
        assert_eq!(export.session_id.as_deref(), Some("flat-1"));
        assert_eq!(export.active_room, RoomKey::Kitchen);
        assert!(aggregator.is_scanning());
    }

    #[test]
    fn test_frames_label_the_active_room() {
        let mut aggregator = scanning_in(RoomKey::Bedroom);
        aggregator.on_signal_scan_result(&[sample("a", "net", -50), sample("b", "net2", -65)]);

        let frames = aggregator.export_for_upload().frames;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].input["a"], -50);
        assert_eq!(frames[0].input["b"], -65);
        assert_eq!(frames[0].output.get(&RoomKey::Bedroom), Some(&1));
    }

    #[test]
    fn test_status_counts() {
        let mut aggregator = scanning_in(RoomKey::Kitchen);
        aggregator.on_signal_scan_result(&[sample("a", "net", -50), sample("b", "net", -50)]);
        aggregator.on_orientation_sample(OrientationSample { x: 0.0, y: 0.0, z: 0.0 });

        let status = aggregator.status();
        assert!(status.scanning);
        assert!(status.signal_counts.contains(&(RoomKey::Kitchen, 2)));
        assert!(status.orientation_counts.contains(&(RoomKey::Kitchen, 1)));
        assert!(status.signal_counts.contains(&(RoomKey::Bedroom, 0)));
    }
}
