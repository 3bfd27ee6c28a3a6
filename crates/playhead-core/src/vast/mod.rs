//! VAST ad manifest handling
//!
//! Parses VAST 2.0+/3.0 XML documents into plain structures and selects the
//! playable creative. Consumed fields: linear media file URLs, skip offset,
//! duration, and the tracking URI templates (impression, quartiles,
//! complete, skip, click).

mod parser;
mod tracker;

pub use parser::{parse_vast, select_creative, VastAd, VastCreative, VastDocument, VastMediaFile};
pub use tracker::{BeaconKind, BeaconSink, HttpBeaconSink, RecordingBeaconSink, VastTracker};

use serde::{Deserialize, Serialize};
use url::Url;

/// Tracking URI set for one resolved creative
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackingUrls {
    pub impression: Vec<Url>,
    pub first_quartile: Vec<Url>,
    pub midpoint: Vec<Url>,
    pub third_quartile: Vec<Url>,
    pub complete: Vec<Url>,
    pub skip: Vec<Url>,
    pub click: Vec<Url>,
}

impl TrackingUrls {
    pub fn urls_for(&self, kind: BeaconKind) -> &[Url] {
        match kind {
            BeaconKind::Impression => &self.impression,
            BeaconKind::FirstQuartile => &self.first_quartile,
            BeaconKind::Midpoint => &self.midpoint,
            BeaconKind::ThirdQuartile => &self.third_quartile,
            BeaconKind::Complete => &self.complete,
            BeaconKind::Skip => &self.skip,
            BeaconKind::Click => &self.click,
        }
    }
}

/// A playable ad resolved from a VAST response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdCreative {
    pub media_file_url: Url,
    pub duration_seconds: f64,
    pub skip_delay_seconds: f64,
    pub click_through_url: Option<Url>,
    pub tracking: TrackingUrls,
}
