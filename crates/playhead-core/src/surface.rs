//! Media surface - the single mount point backing every provider adapter
//!
//! Models the native media element the orchestrator renders into: current
//! source, position, paused/muted/volume flags, platform capabilities, and
//! the stream of native events (timeupdate, ended, click) that providers
//! translate into their own lifecycle callbacks.

use crate::{Error, Result};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use url::Url;

/// Native-level events emitted by the mount point
#[derive(Debug, Clone)]
pub enum SurfaceEvent {
    TimeUpdate { current_time: f64 },
    Play,
    Pause,
    Ended,
    Click,
    Error { message: String, fatal: bool },
}

/// Platform capabilities of the environment hosting the surface
#[derive(Debug, Clone)]
pub struct SurfaceCapabilities {
    /// MediaSource Extensions available (required for adaptive playback)
    pub media_source: bool,
    /// Programmatic play allowed without a prior user gesture
    pub allow_autoplay: bool,
}

impl Default for SurfaceCapabilities {
    fn default() -> Self {
        Self {
            media_source: true,
            allow_autoplay: true,
        }
    }
}

#[derive(Debug, Default)]
struct SurfaceState {
    src: Option<Url>,
    current_time: f64,
    paused: bool,
    muted: bool,
    volume: f64,
    user_gesture_seen: bool,
}

/// The mount point. Exclusively owned by whichever adapter is currently
/// attached; only the orchestrator swaps adapters.
pub struct MediaSurface {
    state: RwLock<SurfaceState>,
    capabilities: SurfaceCapabilities,
    event_tx: broadcast::Sender<SurfaceEvent>,
}

impl MediaSurface {
    pub fn new(capabilities: SurfaceCapabilities) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            state: RwLock::new(SurfaceState {
                paused: true,
                volume: 1.0,
                ..Default::default()
            }),
            capabilities,
            event_tx,
        }
    }

    pub fn capabilities(&self) -> &SurfaceCapabilities {
        &self.capabilities
    }

    /// Subscribe to native events. Dropping the receiver detaches the
    /// listener.
    pub fn subscribe(&self) -> broadcast::Receiver<SurfaceEvent> {
        self.event_tx.subscribe()
    }

    pub async fn set_src(&self, src: Url) {
        let mut state = self.state.write().await;
        debug!(src = %src, "surface source set");
        state.src = Some(src);
        state.current_time = 0.0;
        state.paused = true;
    }

    pub async fn src(&self) -> Option<Url> {
        self.state.read().await.src.clone()
    }

    pub async fn current_time(&self) -> f64 {
        self.state.read().await.current_time
    }

    pub async fn is_paused(&self) -> bool {
        self.state.read().await.paused
    }

    pub async fn set_muted(&self, muted: bool) {
        self.state.write().await.muted = muted;
    }

    pub async fn is_muted(&self) -> bool {
        self.state.read().await.muted
    }

    pub async fn set_volume(&self, volume: f64) {
        self.state.write().await.volume = volume.clamp(0.0, 1.0);
    }

    pub async fn volume(&self) -> f64 {
        self.state.read().await.volume
    }

    /// Record a user gesture, unlocking programmatic playback on platforms
    /// that gate autoplay.
    pub async fn mark_user_gesture(&self) {
        self.state.write().await.user_gesture_seen = true;
    }

    /// Begin playback. Fails with [`Error::AutoplayBlocked`] when the
    /// platform disallows autoplay and no user gesture was recorded yet.
    pub async fn play(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if state.src.is_none() {
            return Err(Error::NothingCued);
        }
        if !self.capabilities.allow_autoplay && !state.user_gesture_seen {
            return Err(Error::AutoplayBlocked);
        }
        if state.paused {
            state.paused = false;
            drop(state);
            let _ = self.event_tx.send(SurfaceEvent::Play);
        }
        Ok(())
    }

    pub async fn pause(&self) {
        let mut state = self.state.write().await;
        if !state.paused {
            state.paused = true;
            drop(state);
            let _ = self.event_tx.send(SurfaceEvent::Pause);
        }
    }

    pub async fn seek(&self, time: f64) {
        let mut state = self.state.write().await;
        state.current_time = time.max(0.0);
        let current_time = state.current_time;
        drop(state);
        let _ = self.event_tx.send(SurfaceEvent::TimeUpdate { current_time });
    }

    // Native event injection. In a real runtime these originate from the
    // media element; tests and embedders drive them directly.

    pub async fn emit_time_update(&self, current_time: f64) {
        self.state.write().await.current_time = current_time;
        let _ = self.event_tx.send(SurfaceEvent::TimeUpdate { current_time });
    }

    pub async fn emit_ended(&self) {
        self.state.write().await.paused = true;
        let _ = self.event_tx.send(SurfaceEvent::Ended);
    }

    pub async fn emit_click(&self) {
        self.state.write().await.user_gesture_seen = true;
        let _ = self.event_tx.send(SurfaceEvent::Click);
    }

    pub fn emit_error(&self, message: impl Into<String>, fatal: bool) {
        let _ = self.event_tx.send(SurfaceEvent::Error {
            message: message.into(),
            fatal,
        });
    }
}

impl Default for MediaSurface {
    fn default() -> Self {
        Self::new(SurfaceCapabilities::default())
    }
}
