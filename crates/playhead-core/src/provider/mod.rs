//! Provider adapters
//!
//! One adapter per playback technology, all exposing the same control
//! surface over the shared mount point. Adapters are swappable at runtime:
//! the orchestrator fully destroys the previous adapter (listeners stopped,
//! native resources released) before attaching the next one to the same
//! surface.

mod dash;
mod embed;
mod html;

pub use dash::DashAdapter;
pub use embed::EmbedAdapter;
pub use html::HtmlVideoAdapter;

use crate::surface::{MediaSurface, SurfaceEvent};
use crate::{MediaItem, PlaybackQuality, ProviderKind, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use url::Url;

/// Lifecycle events a provider reports to the orchestrator
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// Provider attached and able to accept playback commands
    Ready,
    TimeUpdate { current_time: f64 },
    Play,
    Pause,
    Ended,
    Click,
    Error { message: String, fatal: bool },
    PlaybackQualities { qualities: Vec<PlaybackQuality> },
    PlaybackQualityChange { quality: PlaybackQuality },
}

/// Uniform control surface over a playback technology
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Bind a media item to the mount point. Emits [`ProviderEvent::Ready`]
    /// once playback commands may be issued.
    async fn attach(&self, media: &MediaItem) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self);

    async fn seek(&self, time: f64);

    async fn set_volume(&self, volume: f64);

    /// `Auto` re-enables adaptive bitrate selection; a concrete value pins a
    /// rendition. Non-adaptive providers ignore this.
    async fn set_playback_quality(&self, quality: &PlaybackQuality);

    /// Force the source directly onto the native element, bypassing the
    /// normal cue path. Used when re-attaching primary media after an ad on
    /// platforms where autoplay after a detached re-render is unreliable.
    async fn force_set_src(&self, src: &Url);

    async fn current_time(&self) -> f64;

    /// Subscribe to provider lifecycle events
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;

    /// Stop event listeners and release native resources. The adapter must
    /// emit nothing after this returns.
    async fn destroy(&self);
}

/// Guess the provider for a source URL, mirroring how uploaded/linked media
/// is classified before cueing.
pub fn guess_provider(src: &Url) -> ProviderKind {
    let path = src.path().to_lowercase();
    if path.ends_with(".mpd") {
        return ProviderKind::Dash;
    }
    let host = src.host_str().unwrap_or_default();
    if host.contains("youtube") || host.contains("vimeo") {
        return ProviderKind::Embed;
    }
    ProviderKind::HtmlVideo
}

/// Forward native surface events into a provider's own event channel.
/// Returns the pump handle; aborting it is how `destroy` detaches listeners.
pub(crate) fn spawn_surface_forwarder(
    surface: Arc<MediaSurface>,
    tx: broadcast::Sender<ProviderEvent>,
) -> JoinHandle<()> {
    let mut rx = surface.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let mapped = match event {
                        SurfaceEvent::TimeUpdate { current_time } => {
                            ProviderEvent::TimeUpdate { current_time }
                        }
                        SurfaceEvent::Play => ProviderEvent::Play,
                        SurfaceEvent::Pause => ProviderEvent::Pause,
                        SurfaceEvent::Ended => ProviderEvent::Ended,
                        SurfaceEvent::Click => ProviderEvent::Click,
                        SurfaceEvent::Error { message, fatal } => {
                            ProviderEvent::Error { message, fatal }
                        }
                    };
                    let _ = tx.send(mapped);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_provider() {
        let mpd = Url::parse("https://cdn.example.com/live/stream.mpd").unwrap();
        assert_eq!(guess_provider(&mpd), ProviderKind::Dash);

        let yt = Url::parse("https://www.youtube.com/watch?v=abc").unwrap();
        assert_eq!(guess_provider(&yt), ProviderKind::Embed);

        let mp4 = Url::parse("https://cdn.example.com/a.mp4").unwrap();
        assert_eq!(guess_provider(&mp4), ProviderKind::HtmlVideo);

        // HLS plays through the native element
        let m3u8 = Url::parse("https://cdn.example.com/live.m3u8").unwrap();
        assert_eq!(guess_provider(&m3u8), ProviderKind::HtmlVideo);
    }
}
