//! Iframe embed adapter
//!
//! Third-party embeds (YouTube and similar) give no programmatic control
//! surface; the adapter normalizes the source URL (accepting pasted iframe
//! markup) and carries the autoplay preference as a query parameter.

use super::{spawn_surface_forwarder, ProviderAdapter, ProviderEvent};
use crate::surface::MediaSurface;
use crate::{Error, MediaItem, PlaybackQuality, ProviderKind, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;
use url::Url;

pub struct EmbedAdapter {
    surface: Arc<MediaSurface>,
    autoplay: bool,
    event_tx: broadcast::Sender<ProviderEvent>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl EmbedAdapter {
    pub fn new(surface: Arc<MediaSurface>, autoplay: bool) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        let forwarder = spawn_surface_forwarder(surface.clone(), event_tx.clone());
        Self {
            surface,
            autoplay,
            event_tx,
            forwarder: Mutex::new(Some(forwarder)),
        }
    }

    /// Resolve the final embed URL from a raw source, which may be either a
    /// plain URL or pasted `<iframe ...>` markup.
    pub fn resolve_embed_src(raw: &str, autoplay: bool) -> Result<Url> {
        let src = if raw.contains("<iframe") {
            extract_iframe_src(raw)
                .ok_or_else(|| Error::InvalidMediaUrl("iframe markup without src".into()))?
        } else {
            raw.to_string()
        };

        let mut url =
            Url::parse(&src).map_err(|e| Error::InvalidMediaUrl(format!("{src}: {e}")))?;

        let autoplay_value = if autoplay { "1" } else { "0" };
        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "autoplay")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (k, v) in &retained {
                pairs.append_pair(k, v);
            }
            pairs.append_pair("autoplay", autoplay_value);
        }
        Ok(url)
    }
}

/// Pull the src attribute out of iframe markup
fn extract_iframe_src(markup: &str) -> Option<String> {
    let start = markup.find("src=\"")? + 5;
    let rest = &markup[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

#[async_trait]
impl ProviderAdapter for EmbedAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Embed
    }

    async fn attach(&self, media: &MediaItem) -> Result<()> {
        let src = Self::resolve_embed_src(media.src.as_str(), self.autoplay)?;
        self.surface.set_src(src.clone()).await;
        debug!(src = %src, "embed attached");
        let _ = self.event_tx.send(ProviderEvent::Ready);
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        // controlled by the embedded player itself
        Ok(())
    }

    async fn pause(&self) {}

    async fn seek(&self, _time: f64) {}

    async fn set_volume(&self, _volume: f64) {}

    async fn set_playback_quality(&self, _quality: &PlaybackQuality) {}

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
        debug!("embed adapter destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_url_gets_autoplay_param() {
        let url =
            EmbedAdapter::resolve_embed_src("https://www.youtube.com/embed/abc123", true).unwrap();
        assert_eq!(url.query(), Some("autoplay=1"));

        let url =
            EmbedAdapter::resolve_embed_src("https://www.youtube.com/embed/abc123", false).unwrap();
        assert_eq!(url.query(), Some("autoplay=0"));
    }

    #[test]
    fn test_iframe_markup_src_extraction() {
        let markup = r#"<iframe width="560" height="315" src="https://www.youtube.com/embed/xyz?start=30" frameborder="0"></iframe>"#;
        let url = EmbedAdapter::resolve_embed_src(markup, true).unwrap();
        assert_eq!(url.host_str(), Some("www.youtube.com"));
        assert!(url.query().unwrap().contains("start=30"));
        assert!(url.query().unwrap().contains("autoplay=1"));
    }

    #[test]
    fn test_existing_autoplay_param_replaced() {
        let url = EmbedAdapter::resolve_embed_src(
            "https://www.youtube.com/embed/abc?autoplay=1&mute=1",
            false,
        )
        .unwrap();
        let query = url.query().unwrap();
        assert!(query.contains("autoplay=0"));
        assert!(!query.contains("autoplay=1"));
        assert!(query.contains("mute=1"));
    }

    #[test]
    fn test_invalid_markup_rejected() {
        assert!(EmbedAdapter::resolve_embed_src("<iframe></iframe>", true).is_err());
        assert!(EmbedAdapter::resolve_embed_src("not a url", true).is_err());
    }
}
