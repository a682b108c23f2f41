/// Background producers feeding samples to the collector
use futures_util::stream::{BoxStream, StreamExt};
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

use crate::models::{OrientationSample, SignalSample};
use crate::scanning::wifi::WifiScanner;

#[derive(Debug, Clone, PartialEq)]
pub enum SampleEvent {
    Signal(Vec<SignalSample>),
    Orientation(OrientationSample),
}

/// Scan, deliver, wait, repeat
///
/// The delay runs from the previous result, so slow scans stretch the period.
/// A failed scan is logged and delivers nothing; the loop keeps its cadence.
/// Cancellation is checked before each scan and during the wait; a scan that
/// is already running is allowed to finish and its result is still sent.
pub async fn scan_loop(
    scanner: Arc<dyn WifiScanner>,
    events: mpsc::Sender<SampleEvent>,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    info!("Wifi scan loop started");

    loop {
        if cancel_token.is_cancelled() {
            break;
        }

        match scanner.rescan().await {
            Ok(samples) => {
                if events.send(SampleEvent::Signal(samples)).await.is_err() {
                    debug!("Collector gone, ending scan loop");
                    break;
                }
            }
            Err(e) => error!("{}", e),
        }

        tokio::select! {
            _ = sleep(interval) => {}
            _ = cancel_token.cancelled() => break,
        }
    }

    info!("Wifi scan loop stopped");
}

/// Forward magnetometer readings until cancelled or the sensor stream ends
pub async fn forward_orientation(
    mut readings: BoxStream<'static, OrientationSample>,
    events: mpsc::Sender<SampleEvent>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            reading = readings.next() => match reading {
                Some(sample) => {
                    if events.send(SampleEvent::Orientation(sample)).await.is_err() {
                        break;
                    }
                }
                None => {
                    info!("Magnetometer stream ended");
                    break;
                }
            },
            _ = cancel_token.cancelled() => break,
        }
    }
    debug!("Magnetometer subscription closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollectorError;
    use async_trait::async_trait;
    use futures_util::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyScanner {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WifiScanner for FlakyScanner {
        async fn rescan(&self) -> Result<Vec<SignalSample>, CollectorError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call % 2 == 1 {
                return Err(CollectorError::ScanDriver("busy".to_string()));
            }
            Ok(vec![SignalSample {
                bssid: "AA".to_string(),
                ssid: "net".to_string(),
                level: -40 - call as i32,
            }])
        }
    }

    #[tokio::test]
    async fn test_scan_errors_deliver_nothing() {
        let scanner = Arc::new(FlakyScanner { calls: AtomicUsize::new(0) });
        let (tx, mut rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let handle = tokio::spawn(scan_loop(
            scanner.clone(),
            tx,
            Duration::from_millis(1),
            token.clone(),
        ));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        token.cancel();
        handle.await.unwrap();

        // the failed second call sits between the two delivered results
        assert!(matches!(first, SampleEvent::Signal(ref s) if s[0].level == -40));
        assert!(matches!(second, SampleEvent::Signal(ref s) if s[0].level == -42));
        assert!(scanner.calls.load(Ordering::SeqCst) >= 3);
    }

    struct EmptyScanner;

    #[async_trait]
    impl WifiScanner for EmptyScanner {
        async fn rescan(&self) -> Result<Vec<SignalSample>, CollectorError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_empty_scan_is_still_delivered() {
        let (tx, mut rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let handle = tokio::spawn(scan_loop(
            Arc::new(EmptyScanner),
            tx,
            Duration::from_millis(1),
            token.clone(),
        ));

        let first = rx.recv().await.unwrap();
        token.cancel();
        handle.await.unwrap();

        assert_eq!(first, SampleEvent::Signal(Vec::new()));
    }

    #[tokio::test]
    async fn test_cancelled_loop_does_not_scan() {
        let scanner = Arc::new(FlakyScanner { calls: AtomicUsize::new(0) });
        let (tx, mut rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        token.cancel();

        scan_loop(scanner.clone(), tx, Duration::from_millis(1), token).await;

        assert_eq!(scanner.calls.load(Ordering::SeqCst), 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_forward_orientation_until_stream_ends() {
        let samples = vec![
            OrientationSample { x: 1.0, y: 2.0, z: 3.0 },
            OrientationSample { x: 4.0, y: 5.0, z: 6.0 },
        ];
        let (tx, mut rx) = mpsc::channel(8);

        forward_orientation(
            stream::iter(samples.clone()).boxed(),
            tx,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(rx.recv().await, Some(SampleEvent::Orientation(samples[0])));
        assert_eq!(rx.recv().await, Some(SampleEvent::Orientation(samples[1])));
        assert_eq!(rx.recv().await, None);
    }
}
