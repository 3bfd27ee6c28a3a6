//! Tracking beacon delivery
//!
//! Beacons are fire-and-forget: delivery failures are logged and never
//! surface into playback. The tracker enforces at-most-once delivery per
//! event kind (click excepted, which may repeat) and goes inert once
//! closed so a torn-down ad session cannot emit stragglers.

use super::TrackingUrls;
use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// The tracking events a linear creative can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeaconKind {
    Impression,
    FirstQuartile,
    Midpoint,
    ThirdQuartile,
    Complete,
    Skip,
    Click,
}

impl fmt::Display for BeaconKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Impression => "impression",
            Self::FirstQuartile => "firstQuartile",
            Self::Midpoint => "midpoint",
            Self::ThirdQuartile => "thirdQuartile",
            Self::Complete => "complete",
            Self::Skip => "skip",
            Self::Click => "click",
        };
        write!(f, "{name}")
    }
}

/// Delivery backend for tracking beacons.
///
/// The production sink issues HTTP GETs; tests swap in a recording sink.
pub trait BeaconSink: Send + Sync {
    fn deliver(&self, kind: BeaconKind, url: &Url);
}

/// Delivers beacons over HTTP, detached from the caller
pub struct HttpBeaconSink {
    client: reqwest::Client,
}

impl HttpBeaconSink {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpBeaconSink {
    fn default() -> Self {
        Self::new(
            reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        )
    }
}

impl BeaconSink for HttpBeaconSink {
    fn deliver(&self, kind: BeaconKind, url: &Url) {
        let client = self.client.clone();
        let url = url.clone();
        tokio::spawn(async move {
            match client.get(url.clone()).send().await {
                Ok(response) => {
                    debug!(%kind, %url, status = %response.status(), "beacon delivered")
                }
                Err(e) => warn!(%kind, %url, error = %e, "beacon delivery failed"),
            }
        });
    }
}

/// Test sink that records every beacon instead of sending it
#[derive(Default)]
pub struct RecordingBeaconSink {
    fired: Mutex<Vec<(BeaconKind, Url)>>,
}

impl RecordingBeaconSink {
    pub fn fired(&self) -> Vec<(BeaconKind, Url)> {
        self.fired.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<BeaconKind> {
        self.fired.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }

    pub fn count(&self, kind: BeaconKind) -> usize {
        self.fired
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

impl BeaconSink for RecordingBeaconSink {
    fn deliver(&self, kind: BeaconKind, url: &Url) {
        self.fired.lock().unwrap().push((kind, url.clone()));
    }
}

#[derive(Default)]
struct TrackerState {
    fired: HashSet<BeaconKind>,
    closed: bool,
}

/// Beacon scheduler for a single ad session
pub struct VastTracker {
    urls: TrackingUrls,
    sink: std::sync::Arc<dyn BeaconSink>,
    state: Mutex<TrackerState>,
}

impl VastTracker {
    pub fn new(urls: TrackingUrls, sink: std::sync::Arc<dyn BeaconSink>) -> Self {
        Self {
            urls,
            sink,
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Fire all URLs registered for `kind`. Every kind except click is
    /// delivered at most once; repeats are silently dropped.
    pub fn fire(&self, kind: BeaconKind) {
        {
            let mut state = self.state.lock().unwrap();
            if state.closed {
                return;
            }
            if kind != BeaconKind::Click && !state.fired.insert(kind) {
                return;
            }
        }
        for url in self.urls.urls_for(kind) {
            self.sink.deliver(kind, url);
        }
    }

    pub fn has_fired(&self, kind: BeaconKind) -> bool {
        self.state.lock().unwrap().fired.contains(&kind)
    }

    /// Stop all further delivery
    pub fn close(&self) {
        self.state.lock().unwrap().closed = true;
    }
}
