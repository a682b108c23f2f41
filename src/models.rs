use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Room under which samples are grouped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomKey {
    #[default]
    LivingRoom,
    Kitchen,
    Bedroom,
}

impl RoomKey {
    pub const ALL: [RoomKey; 3] = [RoomKey::LivingRoom, RoomKey::Kitchen, RoomKey::Bedroom];

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            RoomKey::LivingRoom => "living room",
            RoomKey::Kitchen => "kitchen",
            RoomKey::Bedroom => "bedroom",
        }
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RoomKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "livingroom" | "living" => Ok(RoomKey::LivingRoom),
            "kitchen" => Ok(RoomKey::Kitchen),
            "bedroom" => Ok(RoomKey::Bedroom),
            _ => Err(format!("Unknown room: '{}'", s.trim())),
        }
    }
}

/// One access point seen by a wifi scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalSample {
    pub bssid: String,
    pub ssid: String,
    pub level: i32,
}

/// One magnetometer reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrientationSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Levels recorded for one access point within a room
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessPointTrace {
    pub ssid: String,
    pub levels: Vec<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomBuffer {
    pub wifi_data: BTreeMap<String, AccessPointTrace>,
    pub magnet_data: Vec<OrientationSample>,
}

impl RoomBuffer {
    pub fn is_empty(&self) -> bool {
        self.wifi_data.is_empty() && self.magnet_data.is_empty()
    }
}

/// One scan tick flattened into a labelled row: `{ input: {bssid: level}, output: {room: 1} }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingFrame {
    pub input: BTreeMap<String, i32>,
    pub output: BTreeMap<RoomKey, u8>,
}

impl TrainingFrame {
    pub fn new(samples: &[SignalSample], room: RoomKey) -> Self {
        let input = samples
            .iter()
            .map(|sample| (sample.bssid.clone(), sample.level))
            .collect();
        let mut output = BTreeMap::new();
        output.insert(room, 1);
        TrainingFrame { input, output }
    }
}

/// Everything collected during one run, plus the scanning state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionBuffer {
    pub rooms: BTreeMap<RoomKey, RoomBuffer>,
    pub frames: Vec<TrainingFrame>,
    pub top_signal: Option<SignalSample>,
    pub top_orientation: Option<OrientationSample>,
    pub active_room: RoomKey,
    pub scanning: bool,
    pub session_id: Option<String>,
}

impl SessionBuffer {
    pub fn room(&self, room: RoomKey) -> Option<&RoomBuffer> {
        self.rooms.get(&room)
    }
}

/// Payload of the `wifi` document; the frame list is stored under `levels`
#[derive(Debug, Clone, Serialize)]
pub struct WifiDocument<'a> {
    pub rooms: BTreeMap<RoomKey, WifiRoom<'a>>,
    #[serde(rename = "levels")]
    pub frames: &'a [TrainingFrame],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiRoom<'a> {
    pub wifi_data: &'a BTreeMap<String, AccessPointTrace>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MagnetometerRoom<'a> {
    pub magnet_data: &'a [OrientationSample],
}
