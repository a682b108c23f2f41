/// Serialization of a session snapshot into the two uploaded documents
use async_trait::async_trait;
use log::info;
use std::collections::BTreeMap;

use crate::error::CollectorError;
use crate::models::{MagnetometerRoom, RoomKey, SessionBuffer, WifiDocument, WifiRoom};

pub const WIFI_DOCUMENT: &str = "wifi";
pub const MAGNETOMETER_DOCUMENT: &str = "magnetometer";
pub const MAX_SESSION_NAME_LEN: usize = 18;

#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Store `payload` as `document_id` in `collection`, replacing what was there
    async fn write(
        &self,
        collection: &str,
        document_id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), String>;
}

/// Trim and bound an operator-entered session name. Empty names yield `None`.
pub fn normalize_session_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_SESSION_NAME_LEN).collect())
}

/// Per-room access point traces plus the labelled scan frames
pub fn wifi_payload(snapshot: &SessionBuffer) -> Result<serde_json::Value, CollectorError> {
    let rooms: BTreeMap<RoomKey, WifiRoom<'_>> = snapshot
        .rooms
        .iter()
        .map(|(room, buffer)| {
            (
                *room,
                WifiRoom {
                    wifi_data: &buffer.wifi_data,
                },
            )
        })
        .collect();

    Ok(serde_json::to_value(WifiDocument {
        rooms,
        frames: &snapshot.frames,
    })?)
}

/// Per-room magnetometer sequences
pub fn magnetometer_payload(snapshot: &SessionBuffer) -> Result<serde_json::Value, CollectorError> {
    let rooms: BTreeMap<RoomKey, MagnetometerRoom<'_>> = snapshot
        .rooms
        .iter()
        .map(|(room, buffer)| {
            (
                *room,
                MagnetometerRoom {
                    magnet_data: &buffer.magnet_data,
                },
            )
        })
        .collect();

    Ok(serde_json::to_value(rooms)?)
}

/// Write both documents of `snapshot` under its session name
///
/// The writes are independent: if the second fails the first stays written.
/// The snapshot is only read, so a failed upload can simply be repeated.
pub async fn upload_session(
    snapshot: &SessionBuffer,
    sink: &dyn DocumentSink,
) -> Result<String, CollectorError> {
    let collection = snapshot
        .session_id
        .as_deref()
        .and_then(normalize_session_name)
        .ok_or(CollectorError::EmptySessionIdentifier)?;

    let documents = [
        (WIFI_DOCUMENT, wifi_payload(snapshot)?),
        (MAGNETOMETER_DOCUMENT, magnetometer_payload(snapshot)?),
    ];

    for (document_id, payload) in documents.iter() {
        sink.write(&collection, document_id, payload)
            .await
            .map_err(|reason| CollectorError::UploadTransport {
                document: document_id.to_string(),
                reason,
            })?;
        info!("Stored document {}/{}", collection, document_id);
    }

    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::SampleAggregator;
    use crate::models::{OrientationSample, SignalSample};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySink {
        writes: Mutex<Vec<(String, String, serde_json::Value)>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl DocumentSink for MemorySink {
        async fn write(
            &self,
            collection: &str,
            document_id: &str,
            payload: &serde_json::Value,
        ) -> Result<(), String> {
            if self.fail_on == Some(document_id) {
                return Err("connection reset".to_string());
            }
            self.writes.lock().unwrap().push((
                collection.to_string(),
                document_id.to_string(),
                payload.clone(),
            ));
            Ok(())
        }
    }

    fn collected_session(session_id: Option<&str>) -> SessionBuffer {
        let mut aggregator = SampleAggregator::new();
        aggregator.set_session_id(session_id.map(str::to_string));
        aggregator.set_active_room(RoomKey::Kitchen);
        aggregator.start_scanning(true);
        aggregator.on_signal_scan_result(&[SignalSample {
            bssid: "a".to_string(),
            ssid: "net".to_string(),
            level: -50,
        }]);
        aggregator.on_orientation_sample(OrientationSample { x: 1.0, y: 2.0, z: 3.0 });
        aggregator.stop_scanning();
        aggregator.export_for_upload()
    }

    #[tokio::test]
    async fn test_missing_session_name_never_reaches_sink() {
        let sink = MemorySink::default();

        for session in [None, Some(""), Some("   ")] {
            let result = upload_session(&collected_session(session), &sink).await;
            assert!(matches!(result, Err(CollectorError::EmptySessionIdentifier)));
        }
        assert!(sink.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_both_documents_written_under_session() {
        let sink = MemorySink::default();
        let collection = upload_session(&collected_session(Some("flat-7")), &sink)
            .await
            .unwrap();
        assert_eq!(collection, "flat-7");

        let writes = sink.writes.lock().unwrap();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].0, "flat-7");
        assert_eq!(writes[0].1, WIFI_DOCUMENT);
        assert_eq!(writes[1].1, MAGNETOMETER_DOCUMENT);

        assert_eq!(
            writes[0].2["rooms"]["kitchen"]["wifiData"]["a"],
            json!({ "ssid": "net", "levels": [-50] })
        );
        assert_eq!(writes[0].2["rooms"]["bedroom"], json!({ "wifiData": {} }));
        assert_eq!(
            writes[0].2["levels"],
            json!([{ "input": { "a": -50 }, "output": { "kitchen": 1 } }])
        );
        assert_eq!(
            writes[1].2["kitchen"],
            json!({ "magnetData": [{ "x": 1.0, "y": 2.0, "z": 3.0 }] })
        );
        assert_eq!(writes[1].2["livingRoom"], json!({ "magnetData": [] }));
        assert!(writes[0].2.get("frames").is_none());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_snapshot_uploadable() {
        let snapshot = collected_session(Some("flat-7"));
        let failing = MemorySink {
            fail_on: Some(MAGNETOMETER_DOCUMENT),
            ..MemorySink::default()
        };

        let result = upload_session(&snapshot, &failing).await;
        assert!(matches!(
            result,
            Err(CollectorError::UploadTransport { ref document, .. }) if document == MAGNETOMETER_DOCUMENT
        ));
        // the first document went through on its own
        assert_eq!(failing.writes.lock().unwrap().len(), 1);

        let healthy = MemorySink::default();
        upload_session(&snapshot, &healthy).await.unwrap();
        assert_eq!(healthy.writes.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_normalize_session_name() {
        assert_eq!(normalize_session_name("  kitchen run "), Some("kitchen run".to_string()));
        assert_eq!(normalize_session_name(" \t"), None);
        assert_eq!(
            normalize_session_name("a-very-long-session-name").map(|s| s.len()),
            Some(MAX_SESSION_NAME_LEN)
        );
    }
}
