//! Core types for Playhead

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playback technology backing the media element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderKind {
    /// Native progressive HTML5 video
    HtmlVideo,
    /// Adaptive bitrate playback over MSE
    Dash,
    /// Third-party iframe embed
    Embed,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::HtmlVideo => write!(f, "htmlVideo"),
            ProviderKind::Dash => write!(f, "dash"),
            ProviderKind::Embed => write!(f, "embed"),
        }
    }
}

/// Caption/subtitle track attached to a media item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub id: String,
    pub src: Url,
    pub label: String,
    pub language: Option<String>,
}

/// A playable unit. Immutable once cued; replaced wholesale on each cue.
///
/// `meta` carries domain-specific payload (video/episode/title records) that
/// is opaque to the orchestrator. Media identity is `src`-based, never
/// object identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub provider: ProviderKind,
    pub src: Url,
    pub poster: Option<Url>,
    #[serde(default)]
    pub captions: Vec<Caption>,
    pub initial_time: Option<f64>,
    /// Ad tag for this item; stripped on post-ad resume so the pre-roll does
    /// not re-trigger.
    pub vast_url: Option<Url>,
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// Prefix used for the ids of synthetic ad placeholder items
const AD_PLACEHOLDER_PREFIX: &str = "vast-ad-";

impl MediaItem {
    pub fn new(id: impl Into<String>, provider: ProviderKind, src: Url) -> Self {
        Self {
            id: id.into(),
            provider,
            src,
            poster: None,
            captions: Vec::new(),
            initial_time: None,
            vast_url: None,
            meta: serde_json::Value::Null,
        }
    }

    /// Synthetic item wrapping a resolved ad creative's media file
    pub fn ad_placeholder(src: Url) -> Self {
        Self::new(
            format!("{AD_PLACEHOLDER_PREFIX}{}", Uuid::new_v4()),
            ProviderKind::HtmlVideo,
            src,
        )
    }

    pub fn with_poster(mut self, poster: Url) -> Self {
        self.poster = Some(poster);
        self
    }

    pub fn with_captions(mut self, captions: Vec<Caption>) -> Self {
        self.captions = captions;
        self
    }

    pub fn with_initial_time(mut self, time: f64) -> Self {
        self.initial_time = Some(time);
        self
    }

    pub fn with_vast_url(mut self, url: Url) -> Self {
        self.vast_url = Some(url);
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }

    /// Media identity: same source URL means same media
    pub fn is_same(&self, other: &MediaItem) -> bool {
        self.src == other.src
    }

    pub fn is_ad_placeholder(&self) -> bool {
        self.id.starts_with(AD_PLACEHOLDER_PREFIX)
    }

    /// Copy of this item with every ad trigger removed, so re-cueing it after
    /// an ad cannot start another ad.
    pub fn without_vast(&self) -> MediaItem {
        let mut item = self.clone();
        item.vast_url = None;
        if let Some(map) = item.meta.as_object_mut() {
            map.remove("vastUrl");
        }
        item
    }
}

/// Ordered list of media items with a playback cursor
#[derive(Debug, Clone, Default)]
pub struct MediaQueue {
    items: Vec<MediaItem>,
    index: usize,
}

impl MediaQueue {
    pub fn new(items: Vec<MediaItem>) -> Self {
        Self { items, index: 0 }
    }

    pub fn current(&self) -> Option<&MediaItem> {
        self.items.get(self.index)
    }

    pub fn peek_next(&self) -> Option<&MediaItem> {
        self.items.get(self.index + 1)
    }

    /// Advance to the next item, returning it if present
    pub fn advance(&mut self) -> Option<&MediaItem> {
        if self.index + 1 < self.items.len() {
            self.index += 1;
            self.items.get(self.index)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replace the queue contents and reset the cursor
    pub fn replace(&mut self, items: Vec<MediaItem>) {
        self.items = items;
        self.index = 0;
    }
}

/// Orchestrator state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackPhase {
    /// No media cued
    Idle,
    /// A cue request is being processed
    CueingPrimary,
    /// Fetching and parsing the VAST document for this cue
    ResolvingAd,
    /// An ad creative is attached and playing
    PlayingAd,
    /// Ad finished; primary media is being restored
    ResumingPrimary,
    /// Primary content attached
    PlayingPrimary,
}

impl PlaybackPhase {
    /// Check if transition to target phase is valid.
    ///
    /// Teardown may force `Idle` from anywhere.
    pub fn can_transition_to(&self, target: PlaybackPhase) -> bool {
        use PlaybackPhase::*;
        if target == Idle {
            return true;
        }
        matches!(
            (self, target),
            (Idle, CueingPrimary)
                | (CueingPrimary, ResolvingAd)
                | (CueingPrimary, PlayingPrimary)
                | (ResolvingAd, PlayingAd)
                | (ResolvingAd, PlayingPrimary)
                | (PlayingAd, ResumingPrimary)
                | (ResumingPrimary, PlayingPrimary)
                | (PlayingPrimary, CueingPrimary)
        )
    }
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackPhase::Idle => write!(f, "idle"),
            PlaybackPhase::CueingPrimary => write!(f, "cueing_primary"),
            PlaybackPhase::ResolvingAd => write!(f, "resolving_ad"),
            PlaybackPhase::PlayingAd => write!(f, "playing_ad"),
            PlaybackPhase::ResumingPrimary => write!(f, "resuming_primary"),
            PlaybackPhase::PlayingPrimary => write!(f, "playing_primary"),
        }
    }
}

/// Requested rendition quality for adaptive providers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackQuality {
    /// Adaptive bitrate selection enabled
    Auto,
    /// Pinned rendition, e.g. "720p"
    Fixed(String),
}

impl std::fmt::Display for PlaybackQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackQuality::Auto => write!(f, "auto"),
            PlaybackQuality::Fixed(name) => write!(f, "{name}"),
        }
    }
}

impl From<&str> for PlaybackQuality {
    fn from(s: &str) -> Self {
        if s.eq_ignore_ascii_case("auto") {
            PlaybackQuality::Auto
        } else {
            PlaybackQuality::Fixed(s.to_string())
        }
    }
}

/// Player configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Attempt playback as soon as media is attached
    pub autoplay: bool,
    /// Start muted
    pub muted: bool,
    /// Resolve and play a pre-roll when the cued item carries a VAST URL
    pub preroll_enabled: bool,
    /// Skip eligibility delay when the creative does not declare one (seconds)
    pub default_skip_delay: f64,
    /// Bounded wait for provider readiness (milliseconds)
    pub provider_ready_timeout_ms: u64,
    /// Delay before re-cueing primary media after an ad (milliseconds).
    /// Mitigates the race between mount teardown and re-attachment.
    pub resume_delay_ms: u64,
    /// HTTP request timeout (milliseconds)
    pub request_timeout_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            autoplay: true,
            muted: false,
            preroll_enabled: true,
            default_skip_delay: 15.0,
            provider_ready_timeout_ms: 5000,
            resume_delay_ms: 500,
            request_timeout_ms: 10000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(src: &str) -> MediaItem {
        MediaItem::new("m1", ProviderKind::HtmlVideo, Url::parse(src).unwrap())
    }

    #[test]
    fn test_media_identity_is_src_based() {
        let a = media("https://cdn.example.com/a.mp4");
        let mut b = media("https://cdn.example.com/a.mp4");
        b.id = "other-id".into();
        assert!(a.is_same(&b));

        let c = media("https://cdn.example.com/c.mp4");
        assert!(!a.is_same(&c));
    }

    #[test]
    fn test_without_vast_strips_field_and_meta() {
        let item = media("https://cdn.example.com/a.mp4")
            .with_vast_url(Url::parse("https://ads.example.com/vast.xml").unwrap())
            .with_meta(serde_json::json!({"vastUrl": "https://ads.example.com/vast.xml", "title": "t"}));

        let stripped = item.without_vast();
        assert!(stripped.vast_url.is_none());
        assert!(stripped.meta.get("vastUrl").is_none());
        assert_eq!(stripped.meta.get("title").unwrap(), "t");
        // original untouched
        assert!(item.vast_url.is_some());
    }

    #[test]
    fn test_ad_placeholder_detection() {
        let ad = MediaItem::ad_placeholder(Url::parse("https://ads.example.com/spot.mp4").unwrap());
        assert!(ad.is_ad_placeholder());
        assert_eq!(ad.provider, ProviderKind::HtmlVideo);
        assert!(!media("https://cdn.example.com/a.mp4").is_ad_placeholder());
    }

    #[test]
    fn test_phase_transitions() {
        use PlaybackPhase::*;
        assert!(Idle.can_transition_to(CueingPrimary));
        assert!(CueingPrimary.can_transition_to(ResolvingAd));
        assert!(CueingPrimary.can_transition_to(PlayingPrimary));
        assert!(ResolvingAd.can_transition_to(PlayingAd));
        assert!(ResolvingAd.can_transition_to(PlayingPrimary));
        assert!(PlayingAd.can_transition_to(ResumingPrimary));
        assert!(ResumingPrimary.can_transition_to(PlayingPrimary));

        // teardown is always allowed
        assert!(PlayingAd.can_transition_to(Idle));
        assert!(ResolvingAd.can_transition_to(Idle));

        // no shortcuts
        assert!(!Idle.can_transition_to(PlayingAd));
        assert!(!PlayingAd.can_transition_to(PlayingPrimary));
        assert!(!PlayingPrimary.can_transition_to(PlayingAd));
    }

    #[test]
    fn test_queue_advance() {
        let mut queue = MediaQueue::new(vec![
            media("https://cdn.example.com/1.mp4"),
            media("https://cdn.example.com/2.mp4"),
        ]);
        assert_eq!(queue.current().unwrap().src.path(), "/1.mp4");
        assert_eq!(queue.advance().unwrap().src.path(), "/2.mp4");
        assert!(queue.advance().is_none());
        assert_eq!(queue.current().unwrap().src.path(), "/2.mp4");
    }

    #[test]
    fn test_playback_quality_from_str() {
        assert_eq!(PlaybackQuality::from("auto"), PlaybackQuality::Auto);
        assert_eq!(
            PlaybackQuality::from("720p"),
            PlaybackQuality::Fixed("720p".into())
        );
    }
}
