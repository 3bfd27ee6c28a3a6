//! Adaptive bitrate (DASH/MSE) adapter
//!
//! Requires MediaSource support from the environment; without it the adapter
//! reports a fatal error and must not be cued through. Publishes the
//! rendition ladder as playback qualities ("auto" plus one entry per
//! rendition height) and lets a concrete selection pin a rendition while
//! disabling adaptive switching.

use super::{spawn_surface_forwarder, ProviderAdapter, ProviderEvent};
use crate::surface::MediaSurface;
use crate::{Error, MediaItem, PlaybackQuality, ProviderKind, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Default)]
struct AbrState {
    /// Adaptive switching enabled (the "auto" quality)
    auto_switch: bool,
    /// Pinned ladder index when auto switching is off
    pinned: Option<usize>,
}

pub struct DashAdapter {
    surface: Arc<MediaSurface>,
    /// Rendition heights, lowest to highest, taken from stream metadata
    ladder: Vec<u32>,
    abr: RwLock<AbrState>,
    event_tx: broadcast::Sender<ProviderEvent>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl DashAdapter {
    pub fn new(surface: Arc<MediaSurface>, ladder: Vec<u32>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        let forwarder = spawn_surface_forwarder(surface.clone(), event_tx.clone());
        Self {
            surface,
            ladder,
            abr: RwLock::new(AbrState {
                auto_switch: true,
                pinned: None,
            }),
            event_tx,
            forwarder: Mutex::new(Some(forwarder)),
        }
    }

    fn quality_name(height: u32) -> String {
        format!("{height}p")
    }

    /// The full quality list offered to the UI: "auto" plus the ladder
    pub fn qualities(&self) -> Vec<PlaybackQuality> {
        let mut qualities = vec![PlaybackQuality::Auto];
        qualities.extend(
            self.ladder
                .iter()
                .map(|h| PlaybackQuality::Fixed(Self::quality_name(*h))),
        );
        qualities
    }

    fn ladder_index(&self, quality: &PlaybackQuality) -> Option<usize> {
        match quality {
            PlaybackQuality::Auto => None,
            PlaybackQuality::Fixed(name) => self
                .ladder
                .iter()
                .position(|h| &Self::quality_name(*h) == name),
        }
    }

    /// Pinned rendition height, if adaptive switching is off
    pub async fn pinned_height(&self) -> Option<u32> {
        let abr = self.abr.read().await;
        abr.pinned.map(|i| self.ladder[i])
    }

    pub async fn auto_switch_enabled(&self) -> bool {
        self.abr.read().await.auto_switch
    }
}

#[async_trait]
impl ProviderAdapter for DashAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Dash
    }

    async fn attach(&self, media: &MediaItem) -> Result<()> {
        if !self.surface.capabilities().media_source {
            let err = Error::UnsupportedFormat {
                provider: self.kind().to_string(),
            };
            self.surface.emit_error(err.to_string(), true);
            return Err(err);
        }

        self.surface.set_src(media.src.clone()).await;
        debug!(src = %media.src, renditions = self.ladder.len(), "dash source attached");

        if !self.ladder.is_empty() {
            let _ = self.event_tx.send(ProviderEvent::PlaybackQualities {
                qualities: self.qualities(),
            });
            let _ = self.event_tx.send(ProviderEvent::PlaybackQualityChange {
                quality: PlaybackQuality::Auto,
            });
        }

        let _ = self.event_tx.send(ProviderEvent::Ready);
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.surface.play().await
    }

    async fn pause(&self) {
        self.surface.pause().await;
    }

    async fn seek(&self, time: f64) {
        self.surface.seek(time).await;
    }

    async fn set_volume(&self, volume: f64) {
        self.surface.set_volume(volume).await;
    }

    async fn set_playback_quality(&self, quality: &PlaybackQuality) {
        let index = self.ladder_index(quality);
        {
            let mut abr = self.abr.write().await;
            // an unknown fixed value falls back to adaptive, same as "auto"
            abr.auto_switch = index.is_none();
            abr.pinned = index;
        }
        if index.is_none() && !matches!(quality, PlaybackQuality::Auto) {
            warn!(quality = %quality, "unknown playback quality, re-enabling adaptive selection");
        }
        let _ = self.event_tx.send(ProviderEvent::PlaybackQualityChange {
            quality: quality.clone(),
        });
    }

    async fn force_set_src(&self, src: &Url) {
        self.surface.set_src(src.clone()).await;
    }

    async fn current_time(&self) -> f64 {
        self.surface.current_time().await
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.event_tx.subscribe()
    }

    async fn destroy(&self) {
        if let Some(handle) = self.forwarder.lock().await.take() {
            handle.abort();
        }
        debug!("dash adapter destroyed");
    }
}
