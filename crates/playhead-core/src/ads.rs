//! Ad resolution and session tracking
//!
//! [`AdController`] turns a VAST tag URL into a playable creative, treating
//! every failure along the way (network, malformed XML, empty pod) as a
//! graceful no-ad outcome. [`AdSession`] owns the lifecycle of one playing
//! ad: quartile progress, skippability, and the beacons each milestone owes.

use crate::vast::{
    parse_vast, select_creative, AdCreative, BeaconKind, BeaconSink, HttpBeaconSink, VastTracker,
};
use crate::{Error, PlayerConfig, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Where an ad break sits relative to the primary content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdType {
    PreRoll,
    MidRoll,
    PostRoll,
    Banner,
}

impl fmt::Display for AdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PreRoll => "pre-roll",
            Self::MidRoll => "mid-roll",
            Self::PostRoll => "post-roll",
            Self::Banner => "banner",
        };
        write!(f, "{name}")
    }
}

/// Fetches the raw VAST document for a tag URL.
///
/// Seam for tests: the HTTP fetcher is swapped for a canned one.
#[async_trait]
pub trait VastFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String>;
}

pub struct HttpVastFetcher {
    client: reqwest::Client,
}

impl HttpVastFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VastFetcher for HttpVastFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::VastFetch(format!("{url}: HTTP {status}")));
        }
        Ok(response.text().await?)
    }
}

/// Canned responses keyed by nothing: every fetch returns the same body
pub struct StaticVastFetcher {
    body: String,
}

impl StaticVastFetcher {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

#[async_trait]
impl VastFetcher for StaticVastFetcher {
    async fn fetch(&self, _url: &Url) -> Result<String> {
        Ok(self.body.clone())
    }
}

/// Resolves VAST tags into creatives and opens tracked ad sessions
pub struct AdController {
    fetcher: Arc<dyn VastFetcher>,
    sink: Arc<dyn BeaconSink>,
    default_skip_delay: f64,
}

impl AdController {
    pub fn new(config: &PlayerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            fetcher: Arc::new(HttpVastFetcher::new(client)),
            sink: Arc::new(HttpBeaconSink::default()),
            default_skip_delay: config.default_skip_delay,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn VastFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn BeaconSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Resolve a VAST tag to a playable creative.
    ///
    /// Returns `None` on any failure: unreachable ad server, unparseable
    /// response, empty pod, or no linear media file. Playback proceeds
    /// without the ad in every such case.
    #[instrument(skip(self), fields(url = %vast_url))]
    pub async fn resolve_ad(&self, vast_url: &Url) -> Option<AdCreative> {
        let body = match self.fetcher.fetch(vast_url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "VAST fetch failed, skipping ad");
                return None;
            }
        };
        let doc = match parse_vast(&body) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "VAST parse failed, skipping ad");
                return None;
            }
        };
        let creative = select_creative(&doc, self.default_skip_delay);
        match &creative {
            Some(c) => info!(
                media_file = %c.media_file_url,
                duration = c.duration_seconds,
                skip_delay = c.skip_delay_seconds,
                "ad creative resolved"
            ),
            None => debug!("no playable creative in VAST response"),
        }
        creative
    }

    /// Open a tracked session for a resolved creative and fire its
    /// impression beacons.
    pub fn begin_session(&self, creative: AdCreative, ad_type: AdType) -> AdSession {
        let tracker = Arc::new(VastTracker::new(
            creative.tracking.clone(),
            self.sink.clone(),
        ));
        tracker.fire(BeaconKind::Impression);
        info!(%ad_type, duration = creative.duration_seconds, "ad session started");
        AdSession::new(creative, ad_type, tracker)
    }
}

/// Lifecycle state of one playing ad
pub struct AdSession {
    creative: AdCreative,
    ad_type: AdType,
    tracker: Arc<VastTracker>,
    /// High-water mark of playback position; backward seeks never lower it
    elapsed: f64,
    paused: bool,
    can_skip: bool,
    fired_first_quartile: bool,
    fired_midpoint: bool,
    fired_third_quartile: bool,
    completed: bool,
}

impl AdSession {
    fn new(creative: AdCreative, ad_type: AdType, tracker: Arc<VastTracker>) -> Self {
        Self {
            creative,
            ad_type,
            tracker,
            elapsed: 0.0,
            paused: false,
            can_skip: false,
            fired_first_quartile: false,
            fired_midpoint: false,
            fired_third_quartile: false,
            completed: false,
        }
    }

    pub fn creative(&self) -> &AdCreative {
        &self.creative
    }

    pub fn ad_type(&self) -> AdType {
        self.ad_type
    }

    pub fn can_skip(&self) -> bool {
        self.can_skip
    }

    /// High-water playback position the session has accounted for
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Seconds until the skip control unlocks, zero once it has
    pub fn skip_countdown(&self) -> f64 {
        (self.creative.skip_delay_seconds - self.elapsed).max(0.0)
    }

    /// Mirror the element's paused flag; progress reported while paused is
    /// stale and must not advance the session.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Advance the session to a playback position.
    ///
    /// Quartile beacons fire exactly once each and always in order; a
    /// position jump past several thresholds fires all of them. A backward
    /// seek neither re-fires beacons nor re-locks the skip control.
    pub fn on_progress(&mut self, position: f64) {
        if self.paused {
            return;
        }
        if position > self.elapsed {
            self.elapsed = position;
        }
        let duration = self.creative.duration_seconds;
        if duration > 0.0 {
            if !self.fired_first_quartile && self.elapsed >= duration * 0.25 {
                self.fired_first_quartile = true;
                self.tracker.fire(BeaconKind::FirstQuartile);
            }
            if !self.fired_midpoint && self.elapsed >= duration * 0.5 {
                self.fired_midpoint = true;
                self.tracker.fire(BeaconKind::Midpoint);
            }
            if !self.fired_third_quartile && self.elapsed >= duration * 0.75 {
                self.fired_third_quartile = true;
                self.tracker.fire(BeaconKind::ThirdQuartile);
            }
        }
        if !self.can_skip && self.elapsed >= self.creative.skip_delay_seconds {
            self.can_skip = true;
            debug!(elapsed = self.elapsed, "skip control unlocked");
        }
    }

    /// Skip the ad. A no-op returning `false` while the skip delay has not
    /// elapsed; afterwards fires the skip beacons, then the completion
    /// beacons, and ends the session.
    pub fn skip(&mut self) -> bool {
        if !self.can_skip || self.completed {
            return false;
        }
        self.completed = true;
        self.tracker.fire(BeaconKind::Skip);
        self.tracker.fire(BeaconKind::Complete);
        info!(elapsed = self.elapsed, "ad skipped");
        true
    }

    /// The creative played to its end
    pub fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        self.paused = false;
        // a creative that ends early still owes its remaining quartiles
        self.on_progress(self.creative.duration_seconds);
        self.tracker.fire(BeaconKind::Complete);
        info!("ad completed");
    }

    pub fn is_finished(&self) -> bool {
        self.completed
    }

    /// Register a click on the creative: fires click tracking and returns
    /// the landing page to open, if the creative declared one.
    pub fn click_through(&self) -> Option<Url> {
        self.tracker.fire(BeaconKind::Click);
        self.creative.click_through_url.clone()
    }

    /// Stop all further beacon delivery for this session
    pub fn close(&self) {
        self.tracker.close();
    }
}
