//! Native HTML5 video adapter
//!
//! Progressive sources and natively supported HLS play directly through the
//! media element; no extra machinery beyond relaying native events.

use super::{spawn_surface_forwarder, ProviderAdapter, ProviderEvent};
use crate::surface::MediaSurface;
use crate::{MediaItem, PlaybackQuality, ProviderKind, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

pub struct HtmlVideoAdapter {
    surface: Arc<MediaSurface>,
    event_tx: broadcast::Sender<ProviderEvent>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl HtmlVideoAdapter {
    pub fn new(surface: Arc<MediaSurface>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        let forwarder = spawn_surface_forwarder(surface.clone(), event_tx.clone());
        Self {
            surface,
            event_tx,
            forwarder: Mutex::new(Some(forwarder)),
        }
    }
}

#[async_trait]
impl ProviderAdapter for HtmlVideoAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::HtmlVideo
    }

    async fn attach(&self, media: &MediaItem) -> Result<()> {
        self.surface.set_src(media.src.clone()).await;
        if let Some(time) = media.initial_time {
            // same effect as a #t= media fragment on the source
            self.surface.seek(time).await;
        }
        debug!(src = %media.src, "html video attached");
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

    async fn set_playback_quality(&self, _quality: &PlaybackQuality) {
        // progressive sources have a single rendition
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
        debug!("html video adapter destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(src: &str) -> MediaItem {
        MediaItem::new("m", ProviderKind::HtmlVideo, Url::parse(src).unwrap())
    }

    #[tokio::test]
    async fn test_attach_emits_ready() {
        let surface = Arc::new(MediaSurface::default());
        let adapter = HtmlVideoAdapter::new(surface.clone());
        let mut rx = adapter.subscribe();

        adapter
            .attach(&media("https://cdn.example.com/a.mp4"))
            .await
            .unwrap();

        assert!(matches!(rx.recv().await.unwrap(), ProviderEvent::Ready));
        assert_eq!(surface.src().await.unwrap().path(), "/a.mp4");
    }

    #[tokio::test]
    async fn test_attach_applies_initial_time() {
        let surface = Arc::new(MediaSurface::default());
        let adapter = HtmlVideoAdapter::new(surface.clone());

        let item = media("https://cdn.example.com/a.mp4").with_initial_time(120.0);
        adapter.attach(&item).await.unwrap();

        assert_eq!(adapter.current_time().await, 120.0);
    }

    #[tokio::test]
    async fn test_destroy_stops_forwarding() {
        let surface = Arc::new(MediaSurface::default());
        let adapter = HtmlVideoAdapter::new(surface.clone());
        let mut rx = adapter.subscribe();

        adapter.destroy().await;
        // give the aborted task a chance to wind down
        tokio::task::yield_now().await;

        surface.emit_time_update(1.0).await;
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
