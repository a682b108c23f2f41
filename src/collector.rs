/// Single owner of the aggregator: applies operator commands and producer events in order
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::aggregator::{LiveStatus, SampleAggregator};
use crate::error::CollectorError;
use crate::models::{RoomBuffer, RoomKey};
use crate::permission::PermissionService;
use crate::scanning::{forward_orientation, scan_loop, OrientationSensor, SampleEvent, WifiScanner};
use crate::store::{KeyValueStore, SESSION_NAME_KEY};
use crate::upload::{normalize_session_name, upload_session, DocumentSink};

const EVENT_QUEUE_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    SetRoom(RoomKey),
    SetSession(String),
    Upload,
    Reset,
    Status,
    Quit,
}

/// Operator-visible flags that are not part of the sample buffer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiFlags {
    pub granted: bool,
    pub sending: bool,
    pub error: bool,
}

pub struct Collaborators {
    pub permission: Box<dyn PermissionService>,
    pub scanner: Arc<dyn WifiScanner>,
    pub sensor: Box<dyn OrientationSensor>,
    pub sink: Box<dyn DocumentSink>,
    pub store: Box<dyn KeyValueStore>,
}

pub struct Intervals {
    pub wifi_scan: Duration,
    pub magnetometer: Duration,
}

pub struct Collector {
    aggregator: SampleAggregator,
    flags: UiFlags,
    collaborators: Collaborators,
    intervals: Intervals,
    events_tx: mpsc::Sender<SampleEvent>,
    events_rx: mpsc::Receiver<SampleEvent>,
    producers: Option<CancellationToken>,
}

impl Collector {
    pub fn new(collaborators: Collaborators, intervals: Intervals) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_SIZE);
        Self {
            aggregator: SampleAggregator::new(),
            flags: UiFlags::default(),
            collaborators,
            intervals,
            events_tx,
            events_rx,
            producers: None,
        }
    }

    /// Ask for permission and restore the last session name
    pub async fn initialize(&mut self) {
        if !self.flags.granted {
            self.flags.granted = self
                .collaborators
                .permission
                .request_location_permission()
                .await;
        }

        if let Some(session) = self.collaborators.store.get(SESSION_NAME_KEY) {
            info!("Restored session name '{}'", session);
            self.aggregator.set_session_id(normalize_session_name(&session));
        }
    }

    pub fn status(&self) -> (LiveStatus, UiFlags) {
        (self.aggregator.status(), self.flags.clone())
    }

    /// Process commands and samples until `Quit`
    ///
    /// A closed command channel only stops command handling; samples keep
    /// being applied until the caller drops this future.
    pub async fn run(&mut self, mut commands: mpsc::Receiver<Command>) {
        let mut commands_open = true;
        loop {
            tokio::select! {
                command = commands.recv(), if commands_open => match command {
                    Some(Command::Quit) => break,
                    None => {
                        info!("Command input closed");
                        commands_open = false;
                    }
                    Some(command) => {
                        if let Err(e) = self.handle_command(command).await {
                            warn!("{}", e);
                        }
                    }
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
        }
        self.stop_scanning();
    }

    pub async fn handle_command(&mut self, command: Command) -> Result<(), CollectorError> {
        match command {
            Command::Start => self.start_scanning(),
            Command::Stop => {
                self.stop_scanning();
                Ok(())
            }
            Command::SetRoom(room) => {
                self.aggregator.set_active_room(room);
                info!("Active room: {}", self.aggregator.active_room());
                Ok(())
            }
            Command::SetSession(name) => self.set_session(&name),
            Command::Upload => self.upload().await,
            Command::Reset => {
                self.aggregator.reset();
                Ok(())
            }
            Command::Status => {
                let (status, flags) = self.status();
                log_status(&status, &flags);
                Ok(())
            }
            Command::Quit => Ok(()),
        }
    }

    pub fn handle_event(&mut self, event: SampleEvent) {
        match event {
            SampleEvent::Signal(samples) => self.aggregator.on_signal_scan_result(&samples),
            SampleEvent::Orientation(sample) => self.aggregator.on_orientation_sample(sample),
        }
    }

    /// Wait for the next producer event and apply it
    #[cfg(test)]
    pub async fn next_event(&mut self) -> Option<SampleEvent> {
        let event = self.events_rx.recv().await?;
        self.handle_event(event.clone());
        Some(event)
    }

    fn start_scanning(&mut self) -> Result<(), CollectorError> {
        if self.aggregator.is_scanning() {
            return Ok(());
        }
        if !self.aggregator.start_scanning(self.flags.granted) {
            return Err(CollectorError::PermissionDenied);
        }

        let cancel_token = CancellationToken::new();

        tokio::spawn(scan_loop(
            self.collaborators.scanner.clone(),
            self.events_tx.clone(),
            self.intervals.wifi_scan,
            cancel_token.clone(),
        ));

        match self.collaborators.sensor.subscribe(self.intervals.magnetometer) {
            Ok(readings) => {
                tokio::spawn(forward_orientation(
                    readings,
                    self.events_tx.clone(),
                    cancel_token.clone(),
                ));
            }
            Err(e) => warn!("{}; collecting wifi only", e),
        }

        self.producers = Some(cancel_token);
        Ok(())
    }

    fn stop_scanning(&mut self) {
        self.aggregator.stop_scanning();
        if let Some(token) = self.producers.take() {
            token.cancel();
        }
    }

    fn set_session(&mut self, raw: &str) -> Result<(), CollectorError> {
        self.flags.error = false;
        let session = normalize_session_name(raw);
        self.aggregator.set_session_id(session.clone());

        match session {
            Some(name) => {
                info!("Session name set to '{}'", name);
                self.collaborators.store.set(SESSION_NAME_KEY, &name)
            }
            None => Ok(()),
        }
    }

    async fn upload(&mut self) -> Result<(), CollectorError> {
        self.stop_scanning();

        if self.aggregator.session_id().is_none() {
            self.flags.error = true;
            return Err(CollectorError::EmptySessionIdentifier);
        }

        let snapshot = self.aggregator.export_for_upload();
        if snapshot.rooms.values().all(RoomBuffer::is_empty) {
            warn!("No samples collected yet, uploading empty documents");
        }
        self.flags.sending = true;
        let result = upload_session(&snapshot, self.collaborators.sink.as_ref()).await;
        self.flags.sending = false;

        match result {
            Ok(collection) => {
                info!("Upload to '{}' complete", collection);
                Ok(())
            }
            Err(e) => {
                error!("Upload failed, data kept for retry: {}", e);
                Err(e)
            }
        }
    }
}

fn log_status(status: &LiveStatus, flags: &UiFlags) {
    info!(
        "{} | room: {} | session: {} | permission: {}",
        if status.scanning { "scanning" } else { "idle" },
        status.active_room,
        status.session_id.as_deref().unwrap_or("<none>"),
        if flags.granted { "granted" } else { "denied" },
    );
    if let Some(top) = &status.top_signal {
        info!("  Top wifi: {} ({}) {}", top.ssid, top.bssid, top.level);
    }
    if let Some(top) = &status.top_orientation {
        info!("  Magnetometer: x={:.2} y={:.2} z={:.2}", top.x, top.y, top.z);
    }
    for ((room, aps), (_, readings)) in status.signal_counts.iter().zip(&status.orientation_counts) {
        info!("  {}: {} access points, {} magnetometer readings", room, aps, readings);
    }
    info!("  {} scan frames", status.frames);
}
