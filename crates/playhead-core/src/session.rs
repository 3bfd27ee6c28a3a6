//! Playback session orchestration
//!
//! [`PlayerSession`] is the state machine that owns one playback surface:
//! it cues primary media, resolves and plays ad breaks around it, swaps
//! provider adapters, and broadcasts every state change as a whole-state
//! snapshot. All mutation funnels through [`PlayerSession::set_phase`],
//! which enforces the transition matrix in
//! [`PlaybackPhase::can_transition_to`].

use crate::ads::{AdController, AdSession, AdType};
use crate::provider::{
    DashAdapter, EmbedAdapter, HtmlVideoAdapter, ProviderAdapter, ProviderEvent,
};
use crate::surface::MediaSurface;
use crate::vast::AdCreative;
use crate::{
    Error, MediaItem, MediaQueue, PlaybackPhase, PlaybackQuality, PlayerConfig, ProviderKind,
    Result, SessionId,
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Snapshot of an active ad, carried inside [`PlaybackState`]
#[derive(Debug, Clone, PartialEq)]
pub struct AdState {
    pub ad_type: AdType,
    pub duration_seconds: f64,
    pub skip_delay_seconds: f64,
    pub can_skip: bool,
    pub elapsed: f64,
}

/// Whole-session state, replaced atomically on every change.
///
/// Observers receive complete snapshots, never field-level deltas, so a
/// consumer can always render from the latest value alone.
#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub phase: PlaybackPhase,
    pub cued_media: Option<MediaItem>,
    /// Primary media an ad displaced; restored when the ad finishes
    pub previous_media: Option<MediaItem>,
    pub ad: Option<AdState>,
    pub controls_visible: bool,
    pub muted: bool,
    pub fullscreen: bool,
    pub provider_ready: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            phase: PlaybackPhase::Idle,
            cued_media: None,
            previous_media: None,
            ad: None,
            controls_visible: false,
            muted: false,
            fullscreen: false,
            provider_ready: false,
        }
    }
}

/// Events emitted by the session for UI and embedder consumption
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    PhaseChange { phase: PlaybackPhase },
    AdStarted { ad_type: AdType },
    AdSkippable,
    AdFinished { ad_type: AdType, skipped: bool },
    ClickThrough { url: Url },
    PlaybackQualities { qualities: Vec<PlaybackQuality> },
    PlaybackQualityChange { quality: PlaybackQuality },
    Ended,
    Error { code: String, message: String, fatal: bool },
}

/// One playback session: a surface, the adapter currently driving it, and
/// the ad/primary state machine around them.
pub struct PlayerSession {
    id: SessionId,
    config: PlayerConfig,
    surface: Arc<MediaSurface>,
    ads: AdController,
    queue: RwLock<MediaQueue>,
    provider: RwLock<Option<Arc<dyn ProviderAdapter>>>,
    ad_session: Mutex<Option<AdSession>>,
    state: RwLock<PlaybackState>,
    state_tx: watch::Sender<PlaybackState>,
    event_tx: broadcast::Sender<PlayerEvent>,
}

impl PlayerSession {
    pub fn new(config: PlayerConfig) -> Arc<Self> {
        Self::with_parts(config.clone(), Arc::new(MediaSurface::default()), AdController::new(&config))
    }

    /// Construct with an explicit surface and ad controller. Tests use this
    /// to inject constrained capabilities and canned VAST responses.
    pub fn with_parts(
        config: PlayerConfig,
        surface: Arc<MediaSurface>,
        ads: AdController,
    ) -> Arc<Self> {
        let initial = PlaybackState {
            muted: config.muted,
            controls_visible: true,
            ..Default::default()
        };
        let (state_tx, _) = watch::channel(initial.clone());
        let (event_tx, _) = broadcast::channel(128);
        let id = SessionId::new();
        info!(session_id = %id, "player session created");
        Arc::new(Self {
            id,
            config,
            surface,
            ads,
            queue: RwLock::new(MediaQueue::default()),
            provider: RwLock::new(None),
            ad_session: Mutex::new(None),
            state: RwLock::new(initial),
            state_tx,
            event_tx,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn surface(&self) -> Arc<MediaSurface> {
        self.surface.clone()
    }

    /// Watch whole-state snapshots; the receiver always holds the latest
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.event_tx.subscribe()
    }

    pub async fn state(&self) -> PlaybackState {
        self.state.read().await.clone()
    }

    /// Apply a mutation to the state and publish the new snapshot
    async fn update_state(&self, f: impl FnOnce(&mut PlaybackState)) {
        let mut state = self.state.write().await;
        f(&mut state);
        let _ = self.state_tx.send(state.clone());
    }

    /// Transition the state machine, rejecting moves the matrix forbids
    async fn set_phase(&self, target: PlaybackPhase) -> Result<()> {
        {
            let state = self.state.read().await;
            let current = state.phase;
            if !current.can_transition_to(target) {
                warn!(session_id = %self.id, from = %current, to = %target, "invalid phase transition");
                return Err(Error::InvalidStateTransition {
                    from: current.to_string(),
                    to: target.to_string(),
                });
            }
            debug!(session_id = %self.id, from = %current, to = %target, "phase transition");
        }
        self.update_state(|s| s.phase = target).await;
        let _ = self.event_tx.send(PlayerEvent::PhaseChange { phase: target });
        Ok(())
    }

    fn build_adapter(&self, media: &MediaItem) -> Arc<dyn ProviderAdapter> {
        match media.provider {
            ProviderKind::HtmlVideo => Arc::new(HtmlVideoAdapter::new(self.surface.clone())),
            ProviderKind::Dash => {
                let ladder = media
                    .meta
                    .get("renditions")
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().filter_map(|v| v.as_u64().map(|h| h as u32)).collect())
                    .unwrap_or_default();
                Arc::new(DashAdapter::new(self.surface.clone(), ladder))
            }
            ProviderKind::Embed => {
                Arc::new(EmbedAdapter::new(self.surface.clone(), self.config.autoplay))
            }
        }
    }

    /// Swap the provider adapter: fully destroy the old one (listeners
    /// stopped, native resources released) before the new one attaches.
    ///
    /// The per-adapter event pump holds only a weak session reference and
    /// exits when the adapter's event channel closes, so a swap never has to
    /// cancel a task that might be the one running this very swap.
    async fn attach_provider(self: &Arc<Self>, media: &MediaItem) -> Result<()> {
        if let Some(old) = self.provider.write().await.take() {
            old.destroy().await;
        }
        self.update_state(|s| s.provider_ready = false).await;

        let adapter = self.build_adapter(media);
        let mut events = adapter.subscribe();
        *self.provider.write().await = Some(adapter.clone());

        let session = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(session) = session.upgrade() else { break };
                        session.handle_provider_event(event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        adapter.attach(media).await
    }

    /// Bounded wait for the attached provider to report readiness, observed
    /// through the state channel so a `Ready` that landed before the wait
    /// began still counts. A timeout fails the whole cue attempt; the
    /// session never claims to be playing through a provider that has not
    /// confirmed readiness.
    async fn wait_provider_ready(&self) -> Result<()> {
        let mut rx = self.state_tx.subscribe();
        let outcome = tokio::time::timeout(
            Duration::from_millis(self.config.provider_ready_timeout_ms),
            rx.wait_for(|s| s.provider_ready),
        )
        .await;
        match outcome {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(Error::NoProvider),
            Err(_) => {
                warn!(session_id = %self.id, "provider readiness wait timed out");
                Err(Error::ProviderReadyTimeout)
            }
        }
    }

    /// Attempt playback, treating a platform autoplay rejection as a paused
    /// session rather than a failure.
    async fn try_autoplay(&self) -> Result<()> {
        let provider = self
            .provider
            .read()
            .await
            .clone()
            .ok_or(Error::NoProvider)?;
        match provider.play().await {
            Ok(()) => Ok(()),
            Err(Error::AutoplayBlocked) => {
                debug!(session_id = %self.id, "autoplay rejected, session stays paused");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Cue a single media item, playing a pre-roll first when the item
    /// carries an ad tag.
    #[instrument(skip(self, media), fields(session_id = %self.id, media_id = %media.id))]
    pub async fn cue(self: &Arc<Self>, media: MediaItem) -> Result<()> {
        self.set_phase(PlaybackPhase::CueingPrimary).await?;

        let preroll_tag = if self.config.preroll_enabled && !media.is_ad_placeholder() {
            media.vast_url.clone()
        } else {
            None
        };

        self.update_state(|s| {
            s.previous_media = None;
            s.cued_media = Some(media.clone());
        })
        .await;

        if let Some(tag) = preroll_tag {
            self.set_phase(PlaybackPhase::ResolvingAd).await?;
            let creative = self.ads.resolve_ad(&tag).await;
            if self.state.read().await.phase != PlaybackPhase::ResolvingAd {
                debug!("cue abandoned while resolving ad");
                return Ok(());
            }
            if let Some(creative) = creative {
                return self.play_ad(media, creative, AdType::PreRoll).await;
            }
            debug!("no playable ad, cueing primary directly");
        }

        self.attach_provider(&media).await?;
        self.wait_provider_ready().await?;
        self.set_phase(PlaybackPhase::PlayingPrimary).await?;
        if self.config.autoplay {
            self.try_autoplay().await?;
        }
        Ok(())
    }

    /// Replace the playback queue and cue its first item. When an item ends,
    /// the session advances to the next automatically.
    pub async fn cue_playlist(self: &Arc<Self>, items: Vec<MediaItem>) -> Result<()> {
        let first = {
            let mut queue = self.queue.write().await;
            queue.replace(items);
            queue.current().cloned()
        };
        match first {
            Some(media) => self.cue(media).await,
            None => Err(Error::NothingCued),
        }
    }

    /// Resolve and play an ad break against the currently cued media.
    /// A break that fails to resolve leaves playback untouched.
    #[instrument(skip(self, vast_url), fields(session_id = %self.id, %ad_type))]
    pub async fn start_ad_break(self: &Arc<Self>, vast_url: &Url, ad_type: AdType) -> Result<()> {
        let primary = self
            .state
            .read()
            .await
            .cued_media
            .clone()
            .ok_or(Error::NothingCued)?;
        // the matrix only reaches PlayingAd through ResolvingAd
        self.set_phase(PlaybackPhase::CueingPrimary).await?;
        self.set_phase(PlaybackPhase::ResolvingAd).await?;
        let creative = self.ads.resolve_ad(vast_url).await;
        if self.state.read().await.phase != PlaybackPhase::ResolvingAd {
            debug!("ad break abandoned during resolution");
            return Ok(());
        }
        let Some(creative) = creative else {
            debug!("ad break resolved to nothing, playback continues");
            self.set_phase(PlaybackPhase::PlayingPrimary).await?;
            return Ok(());
        };
        self.play_ad(primary, creative, ad_type).await
    }

    /// Attach and start a resolved creative, displacing `primary`.
    async fn play_ad(
        self: &Arc<Self>,
        primary: MediaItem,
        creative: AdCreative,
        ad_type: AdType,
    ) -> Result<()> {
        // a teardown that landed during resolution already owns the session
        if self.state.read().await.phase != PlaybackPhase::ResolvingAd {
            debug!(session_id = %self.id, "ad start abandoned, session no longer resolving");
            return Ok(());
        }

        let placeholder = MediaItem::ad_placeholder(creative.media_file_url.clone());

        // never stack ads: an ad placeholder is not restorable primary media
        let previous = if primary.is_ad_placeholder() {
            None
        } else {
            Some(primary)
        };

        let session = self.ads.begin_session(creative.clone(), ad_type);
        *self.ad_session.lock().await = Some(session);

        self.update_state(|s| {
            s.previous_media = previous;
            s.cued_media = Some(placeholder.clone());
            s.controls_visible = false;
            s.ad = Some(AdState {
                ad_type,
                duration_seconds: creative.duration_seconds,
                skip_delay_seconds: creative.skip_delay_seconds,
                can_skip: false,
                elapsed: 0.0,
            });
        })
        .await;

        self.attach_provider(&placeholder).await?;
        self.wait_provider_ready().await?;
        self.set_phase(PlaybackPhase::PlayingAd).await?;
        let _ = self.event_tx.send(PlayerEvent::AdStarted { ad_type });
        self.try_autoplay().await
    }

    /// Tear down a finished ad and restore primary playback.
    ///
    /// Post-roll is terminal: the displaced media is not re-cued. Otherwise
    /// the primary item returns with its ad triggers stripped, after a short
    /// settle delay, and an autoplay rejection leaves it paused.
    async fn finish_ad(self: &Arc<Self>, skipped: bool) -> Result<()> {
        let Some(session) = self.ad_session.lock().await.take() else {
            return Ok(());
        };
        let ad_type = session.ad_type();
        session.close();

        let previous = self.state.read().await.previous_media.clone();
        self.update_state(|s| {
            s.ad = None;
            s.previous_media = None;
            s.controls_visible = true;
        })
        .await;
        let _ = self.event_tx.send(PlayerEvent::AdFinished { ad_type, skipped });

        if ad_type == AdType::PostRoll {
            info!(session_id = %self.id, "post-roll finished, session complete");
            self.set_phase(PlaybackPhase::Idle).await?;
            let _ = self.event_tx.send(PlayerEvent::Ended);
            return Ok(());
        }

        let Some(previous) = previous else {
            self.set_phase(PlaybackPhase::Idle).await?;
            return Ok(());
        };

        self.set_phase(PlaybackPhase::ResumingPrimary).await?;
        // let the mount settle before re-attaching, otherwise the source swap
        // races the ad teardown on some platforms
        tokio::time::sleep(Duration::from_millis(self.config.resume_delay_ms)).await;

        let restored = previous.without_vast();
        self.attach_provider(&restored).await?;
        if let Some(provider) = self.provider.read().await.clone() {
            // direct source assignment, autoplay after re-render is unreliable
            provider.force_set_src(&restored.src).await;
        }
        self.update_state(|s| s.cued_media = Some(restored)).await;
        self.wait_provider_ready().await?;
        self.set_phase(PlaybackPhase::PlayingPrimary).await?;
        self.try_autoplay().await
    }

    /// Skip the active ad. A no-op while the skip delay has not elapsed or
    /// when no ad is playing.
    pub async fn skip_ad(self: &Arc<Self>) -> Result<()> {
        let skipped = {
            let mut guard = self.ad_session.lock().await;
            match guard.as_mut() {
                Some(session) => session.skip(),
                None => false,
            }
        };
        if skipped {
            self.finish_ad(true).await?;
        }
        Ok(())
    }

    /// Feed one provider event through the state machine. The internal event
    /// pump calls this; tests drive it directly.
    ///
    /// Returns a boxed future: handling `Ended` can cue the next item, which
    /// attaches a provider whose pump calls back into this function, and the
    /// type erasure is what keeps that recursion finite for the compiler.
    pub fn handle_provider_event(
        self: &Arc<Self>,
        event: ProviderEvent,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let session = self.clone();
        Box::pin(async move { session.handle_provider_event_inner(event).await })
    }

    async fn handle_provider_event_inner(self: &Arc<Self>, event: ProviderEvent) {
        match event {
            ProviderEvent::Ready => {
                self.update_state(|s| s.provider_ready = true).await;
            }
            ProviderEvent::TimeUpdate { current_time } => {
                self.on_time_update(current_time).await;
            }
            ProviderEvent::Ended => {
                if let Err(e) = self.on_ended().await {
                    warn!(session_id = %self.id, error = %e, "ended handling failed");
                }
            }
            ProviderEvent::Click => {
                let landing = {
                    let guard = self.ad_session.lock().await;
                    guard.as_ref().and_then(|s| s.click_through())
                };
                if let Some(url) = landing {
                    let _ = self.event_tx.send(PlayerEvent::ClickThrough { url });
                }
            }
            ProviderEvent::Error { message, fatal } => {
                warn!(session_id = %self.id, %message, fatal, "provider error");
                let _ = self.event_tx.send(PlayerEvent::Error {
                    code: "PROVIDER".into(),
                    message,
                    fatal,
                });
                if fatal {
                    self.teardown().await;
                }
            }
            ProviderEvent::PlaybackQualities { qualities } => {
                let _ = self
                    .event_tx
                    .send(PlayerEvent::PlaybackQualities { qualities });
            }
            ProviderEvent::PlaybackQualityChange { quality } => {
                let _ = self
                    .event_tx
                    .send(PlayerEvent::PlaybackQualityChange { quality });
            }
            ProviderEvent::Play | ProviderEvent::Pause => {
                let paused = matches!(event, ProviderEvent::Pause);
                if let Some(session) = self.ad_session.lock().await.as_mut() {
                    session.set_paused(paused);
                }
            }
        }
    }

    async fn on_time_update(&self, current_time: f64) {
        let (has_ad, newly_skippable, elapsed) = {
            let mut guard = self.ad_session.lock().await;
            match guard.as_mut() {
                Some(session) => {
                    let before = session.can_skip();
                    session.on_progress(current_time);
                    (true, !before && session.can_skip(), session.elapsed())
                }
                None => (false, false, 0.0),
            }
        };
        if !has_ad {
            return;
        }
        self.update_state(|s| {
            if let Some(ad) = s.ad.as_mut() {
                ad.elapsed = elapsed;
                if newly_skippable {
                    ad.can_skip = true;
                }
            }
        })
        .await;
        if newly_skippable {
            let _ = self.event_tx.send(PlayerEvent::AdSkippable);
        }
    }

    async fn on_ended(self: &Arc<Self>) -> Result<()> {
        let ad_playing = {
            let mut guard = self.ad_session.lock().await;
            match guard.as_mut() {
                Some(session) => {
                    session.complete();
                    true
                }
                None => false,
            }
        };
        if ad_playing {
            return self.finish_ad(false).await;
        }

        let next = self.queue.write().await.advance().cloned();
        match next {
            Some(media) => {
                info!(session_id = %self.id, media_id = %media.id, "advancing playback queue");
                self.cue(media).await
            }
            None => {
                let _ = self.event_tx.send(PlayerEvent::Ended);
                Ok(())
            }
        }
    }

    // Pass-through playback controls

    pub async fn play(&self) -> Result<()> {
        let provider = self
            .provider
            .read()
            .await
            .clone()
            .ok_or(Error::NoProvider)?;
        provider.play().await
    }

    pub async fn pause(&self) -> Result<()> {
        let provider = self
            .provider
            .read()
            .await
            .clone()
            .ok_or(Error::NoProvider)?;
        provider.pause().await;
        Ok(())
    }

    /// Seek primary media. Ignored while an ad plays; ads do not scrub.
    pub async fn seek(&self, time: f64) -> Result<()> {
        if self.state.read().await.ad.is_some() {
            debug!(session_id = %self.id, "seek ignored during ad");
            return Ok(());
        }
        let provider = self
            .provider
            .read()
            .await
            .clone()
            .ok_or(Error::NoProvider)?;
        provider.seek(time).await;
        Ok(())
    }

    pub async fn current_time(&self) -> f64 {
        match self.provider.read().await.clone() {
            Some(provider) => provider.current_time().await,
            None => 0.0,
        }
    }

    pub async fn set_playback_quality(&self, quality: PlaybackQuality) -> Result<()> {
        let provider = self
            .provider
            .read()
            .await
            .clone()
            .ok_or(Error::NoProvider)?;
        provider.set_playback_quality(&quality).await;
        Ok(())
    }

    pub async fn set_muted(&self, muted: bool) {
        self.surface.set_muted(muted).await;
        self.update_state(|s| s.muted = muted).await;
    }

    pub async fn set_fullscreen(&self, fullscreen: bool) {
        self.update_state(|s| s.fullscreen = fullscreen).await;
    }

    /// Tear everything down: provider destroyed, ad beacons silenced,
    /// state back to idle.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn teardown(&self) {
        if let Some(session) = self.ad_session.lock().await.take() {
            session.close();
        }
        if let Some(provider) = self.provider.write().await.take() {
            provider.destroy().await;
        }
        self.update_state(|s| {
            *s = PlaybackState {
                muted: s.muted,
                controls_visible: true,
                ..Default::default()
            };
        })
        .await;
        info!("session torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::StaticVastFetcher;
    use crate::vast::RecordingBeaconSink;

    fn media(src: &str) -> MediaItem {
        MediaItem::new("m1", ProviderKind::HtmlVideo, Url::parse(src).unwrap())
    }

    fn session_with_vast(body: &str) -> (Arc<PlayerSession>, Arc<RecordingBeaconSink>) {
        let config = PlayerConfig {
            resume_delay_ms: 0,
            provider_ready_timeout_ms: 200,
            ..Default::default()
        };
        let sink = Arc::new(RecordingBeaconSink::default());
        let ads = AdController::new(&config)
            .with_fetcher(Arc::new(StaticVastFetcher::new(body)))
            .with_sink(sink.clone());
        let session = PlayerSession::with_parts(config, Arc::new(MediaSurface::default()), ads);
        (session, sink)
    }

    const VAST_BODY: &str = r#"<VAST version="3.0">
  <Ad id="a"><InLine>
    <Impression>https://ads.example.com/imp</Impression>
    <Creatives><Creative><Linear skipoffset="00:00:05">
      <Duration>00:00:20</Duration>
      <TrackingEvents>
        <Tracking event="complete">https://ads.example.com/done</Tracking>
        <Tracking event="skip">https://ads.example.com/skip</Tracking>
      </TrackingEvents>
      <MediaFiles><MediaFile type="video/mp4">https://ads.example.com/spot.mp4</MediaFile></MediaFiles>
    </Linear></Creative></Creatives>
  </InLine></Ad>
</VAST>"#;

    #[tokio::test]
    async fn test_cue_without_vast_goes_straight_to_primary() {
        let (session, _) = session_with_vast(VAST_BODY);
        session
            .cue(media("https://cdn.example.com/movie.mp4"))
            .await
            .unwrap();

        let state = session.state().await;
        assert_eq!(state.phase, PlaybackPhase::PlayingPrimary);
        assert!(state.ad.is_none());
        assert_eq!(state.cued_media.unwrap().src.path(), "/movie.mp4");
    }

    #[tokio::test]
    async fn test_cue_with_vast_plays_preroll() {
        let (session, sink) = session_with_vast(VAST_BODY);
        let item = media("https://cdn.example.com/movie.mp4")
            .with_vast_url(Url::parse("https://ads.example.com/tag").unwrap());

        session.cue(item).await.unwrap();

        let state = session.state().await;
        assert_eq!(state.phase, PlaybackPhase::PlayingAd);
        assert!(!state.controls_visible);
        let cued = state.cued_media.unwrap();
        assert!(cued.is_ad_placeholder());
        assert_eq!(cued.src.path(), "/spot.mp4");
        assert_eq!(
            state.previous_media.unwrap().src.path(),
            "/movie.mp4"
        );
        assert_eq!(sink.count(crate::vast::BeaconKind::Impression), 1);
    }

    #[tokio::test]
    async fn test_empty_vast_falls_back_to_primary() {
        let (session, sink) = session_with_vast(r#"<VAST version="3.0"></VAST>"#);
        let item = media("https://cdn.example.com/movie.mp4")
            .with_vast_url(Url::parse("https://ads.example.com/tag").unwrap());

        session.cue(item).await.unwrap();

        let state = session.state().await;
        assert_eq!(state.phase, PlaybackPhase::PlayingPrimary);
        assert!(sink.fired().is_empty());
    }

    #[tokio::test]
    async fn test_ad_end_resumes_primary_with_vast_stripped() {
        let (session, _) = session_with_vast(VAST_BODY);
        let item = media("https://cdn.example.com/movie.mp4")
            .with_vast_url(Url::parse("https://ads.example.com/tag").unwrap());
        session.cue(item).await.unwrap();
        assert_eq!(session.state().await.phase, PlaybackPhase::PlayingAd);

        session.handle_provider_event(ProviderEvent::Ended).await;

        let state = session.state().await;
        assert_eq!(state.phase, PlaybackPhase::PlayingPrimary);
        assert!(state.controls_visible);
        let cued = state.cued_media.unwrap();
        assert_eq!(cued.src.path(), "/movie.mp4");
        assert!(cued.vast_url.is_none());
        assert!(state.previous_media.is_none());
        assert!(state.ad.is_none());
    }

    #[tokio::test]
    async fn test_skip_before_delay_is_noop() {
        let (session, sink) = session_with_vast(VAST_BODY);
        let item = media("https://cdn.example.com/movie.mp4")
            .with_vast_url(Url::parse("https://ads.example.com/tag").unwrap());
        session.cue(item).await.unwrap();

        session
            .handle_provider_event(ProviderEvent::TimeUpdate { current_time: 3.0 })
            .await;
        session.skip_ad().await.unwrap();
        assert_eq!(session.state().await.phase, PlaybackPhase::PlayingAd);
        assert_eq!(sink.count(crate::vast::BeaconKind::Skip), 0);

        session
            .handle_provider_event(ProviderEvent::TimeUpdate { current_time: 5.0 })
            .await;
        assert!(session.state().await.ad.as_ref().unwrap().can_skip);
        session.skip_ad().await.unwrap();
        assert_eq!(session.state().await.phase, PlaybackPhase::PlayingPrimary);
        assert_eq!(sink.count(crate::vast::BeaconKind::Skip), 1);
    }

    #[tokio::test]
    async fn test_post_roll_is_terminal() {
        let (session, _) = session_with_vast(VAST_BODY);
        session
            .cue(media("https://cdn.example.com/movie.mp4"))
            .await
            .unwrap();

        let tag = Url::parse("https://ads.example.com/tag").unwrap();
        session.start_ad_break(&tag, AdType::PostRoll).await.unwrap();
        assert_eq!(session.state().await.phase, PlaybackPhase::PlayingAd);

        session.handle_provider_event(ProviderEvent::Ended).await;

        let state = session.state().await;
        assert_eq!(state.phase, PlaybackPhase::Idle);
        assert!(state.previous_media.is_none());
    }

    #[tokio::test]
    async fn test_queue_advances_on_ended() {
        let (session, _) = session_with_vast(VAST_BODY);
        session
            .cue_playlist(vec![
                media("https://cdn.example.com/1.mp4"),
                media("https://cdn.example.com/2.mp4"),
            ])
            .await
            .unwrap();
        assert_eq!(
            session.state().await.cued_media.unwrap().src.path(),
            "/1.mp4"
        );

        session.handle_provider_event(ProviderEvent::Ended).await;
        assert_eq!(
            session.state().await.cued_media.unwrap().src.path(),
            "/2.mp4"
        );

        let mut events = session.subscribe_events();
        session.handle_provider_event(ProviderEvent::Ended).await;
        let mut saw_ended = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, PlayerEvent::Ended) {
                saw_ended = true;
            }
        }
        assert!(saw_ended);
    }

    #[tokio::test]
    async fn test_seek_ignored_during_ad() {
        let (session, _) = session_with_vast(VAST_BODY);
        let item = media("https://cdn.example.com/movie.mp4")
            .with_vast_url(Url::parse("https://ads.example.com/tag").unwrap());
        session.cue(item).await.unwrap();

        session
            .handle_provider_event(ProviderEvent::TimeUpdate { current_time: 2.0 })
            .await;
        session.seek(100.0).await.unwrap();
        // ad elapsed untouched by the attempted scrub
        assert_eq!(session.state().await.ad.unwrap().elapsed, 2.0);
    }

    #[tokio::test]
    async fn test_teardown_resets_to_idle() {
        let (session, sink) = session_with_vast(VAST_BODY);
        let item = media("https://cdn.example.com/movie.mp4")
            .with_vast_url(Url::parse("https://ads.example.com/tag").unwrap());
        session.cue(item).await.unwrap();

        session.teardown().await;

        let state = session.state().await;
        assert_eq!(state.phase, PlaybackPhase::Idle);
        assert!(state.cued_media.is_none());

        // beacons from the torn-down ad session stay silent
        let before = sink.fired().len();
        session
            .handle_provider_event(ProviderEvent::TimeUpdate { current_time: 20.0 })
            .await;
        assert_eq!(sink.fired().len(), before);
    }

    #[tokio::test]
    async fn test_autoplay_rejection_leaves_session_paused() {
        let config = PlayerConfig {
            resume_delay_ms: 0,
            provider_ready_timeout_ms: 200,
            ..Default::default()
        };
        let surface = Arc::new(MediaSurface::new(crate::surface::SurfaceCapabilities {
            media_source: true,
            allow_autoplay: false,
        }));
        let ads = AdController::new(&config)
            .with_fetcher(Arc::new(StaticVastFetcher::new(r#"<VAST version="3.0"></VAST>"#)));
        let session = PlayerSession::with_parts(config, surface.clone(), ads);

        session
            .cue(media("https://cdn.example.com/movie.mp4"))
            .await
            .unwrap();

        assert_eq!(session.state().await.phase, PlaybackPhase::PlayingPrimary);
        assert!(surface.is_paused().await);
    }

    #[tokio::test]
    async fn test_readiness_wait_times_out_without_provider() {
        let (session, _) = session_with_vast(VAST_BODY);
        // nothing attached, so no Ready ever lands on the state channel
        let err = session.wait_provider_ready().await.unwrap_err();
        assert!(matches!(err, Error::ProviderReadyTimeout));
        assert_eq!(session.state().await.phase, PlaybackPhase::Idle);
    }

    /// Fetcher that parks inside `fetch` until the test releases it, so a
    /// teardown can land while ad resolution is still in flight.
    struct GatedFetcher {
        body: String,
        entered: Arc<tokio::sync::Notify>,
        release: Arc<tokio::sync::Notify>,
    }

    #[async_trait::async_trait]
    impl crate::ads::VastFetcher for GatedFetcher {
        async fn fetch(&self, _url: &Url) -> Result<String> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(self.body.clone())
        }
    }

    #[tokio::test]
    async fn test_teardown_during_ad_resolution_abandons_the_break() {
        let config = PlayerConfig {
            resume_delay_ms: 0,
            provider_ready_timeout_ms: 200,
            ..Default::default()
        };
        let entered = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let sink = Arc::new(RecordingBeaconSink::default());
        let ads = AdController::new(&config)
            .with_fetcher(Arc::new(GatedFetcher {
                body: VAST_BODY.to_string(),
                entered: entered.clone(),
                release: release.clone(),
            }))
            .with_sink(sink.clone());
        let session = PlayerSession::with_parts(config, Arc::new(MediaSurface::default()), ads);

        let item = media("https://cdn.example.com/movie.mp4")
            .with_vast_url(Url::parse("https://ads.example.com/tag").unwrap());
        let cueing = tokio::spawn({
            let session = session.clone();
            async move { session.cue(item).await }
        });

        entered.notified().await;
        session.teardown().await;
        release.notify_one();
        cueing.await.unwrap().unwrap();

        // the break is abandoned wholesale: no impression, no ad state
        let state = session.state().await;
        assert_eq!(state.phase, PlaybackPhase::Idle);
        assert!(state.ad.is_none());
        assert!(state.cued_media.is_none());
        assert!(sink.fired().is_empty());

        // and the session takes a fresh cue afterwards
        session
            .cue(media("https://cdn.example.com/next.mp4"))
            .await
            .unwrap();
        assert_eq!(session.state().await.phase, PlaybackPhase::PlayingPrimary);
    }
}
