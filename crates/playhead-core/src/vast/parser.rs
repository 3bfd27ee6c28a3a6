//! Streaming quick-xml parser for VAST documents
//!
//! Extracts only the fields playback consumes: impressions, linear
//! creatives with their media files, skip offset, duration, tracking event
//! URIs, and click-through/click-tracking URLs.

use super::{AdCreative, TrackingUrls};
use crate::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

/// One `<Ad>` element of a VAST response, in declaration order
#[derive(Debug, Clone, Default)]
pub struct VastAd {
    pub id: Option<String>,
    pub impressions: Vec<String>,
    pub creatives: Vec<VastCreative>,
}

/// One `<Creative>` element
#[derive(Debug, Clone, Default)]
pub struct VastCreative {
    /// Creative contained a `<Linear>` block
    pub linear: bool,
    pub duration_seconds: Option<f64>,
    /// Raw `skipoffset` attribute ("HH:MM:SS", seconds, or "n%")
    pub skip_offset: Option<String>,
    pub media_files: Vec<VastMediaFile>,
    /// (event name, URI) pairs from `<TrackingEvents>`
    pub tracking: Vec<(String, String)>,
    pub click_through: Option<String>,
    pub click_tracking: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VastMediaFile {
    pub url: String,
    pub mime_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Parsed VAST response
#[derive(Debug, Clone, Default)]
pub struct VastDocument {
    pub ads: Vec<VastAd>,
}

fn parse_attributes(e: &BytesStart) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        if let Ok(value) = attr.unescape_value() {
            attrs.insert(key, value.to_string());
        }
    }
    attrs
}

/// Parse a VAST XML document
pub fn parse_vast(content: &str) -> Result<VastDocument> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut doc = VastDocument::default();
    let mut current_ad: Option<VastAd> = None;
    let mut current_creative: Option<VastCreative> = None;
    let mut current_media_file: Option<VastMediaFile> = None;
    let mut current_tracking_event: Option<String> = None;
    let mut current_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match name.as_str() {
                    "Ad" => {
                        let attrs = parse_attributes(e);
                        current_ad = Some(VastAd {
                            id: attrs.get("id").cloned(),
                            ..Default::default()
                        });
                    }
                    "Creative" => {
                        current_creative = Some(VastCreative::default());
                    }
                    "Linear" => {
                        if let Some(ref mut creative) = current_creative {
                            creative.linear = true;
                            let attrs = parse_attributes(e);
                            creative.skip_offset = attrs.get("skipoffset").cloned();
                        }
                    }
                    "MediaFile" => {
                        let attrs = parse_attributes(e);
                        current_media_file = Some(VastMediaFile {
                            url: String::new(),
                            mime_type: attrs.get("type").cloned(),
                            width: attrs.get("width").and_then(|w| w.parse().ok()),
                            height: attrs.get("height").and_then(|h| h.parse().ok()),
                        });
                    }
                    "Tracking" => {
                        let attrs = parse_attributes(e);
                        current_tracking_event = attrs.get("event").cloned();
                    }
                    _ => {}
                }
                current_text.clear();
            }

            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                let text = current_text.trim().to_string();
                match name.as_str() {
                    "Ad" => {
                        if let Some(ad) = current_ad.take() {
                            doc.ads.push(ad);
                        }
                    }
                    "Creative" => {
                        if let (Some(ad), Some(creative)) =
                            (current_ad.as_mut(), current_creative.take())
                        {
                            ad.creatives.push(creative);
                        }
                    }
                    "Impression" => {
                        if let Some(ref mut ad) = current_ad {
                            if !text.is_empty() {
                                ad.impressions.push(text);
                            }
                        }
                    }
                    "Duration" => {
                        if let Some(ref mut creative) = current_creative {
                            creative.duration_seconds = parse_duration(&text);
                        }
                    }
                    "MediaFile" => {
                        if let (Some(creative), Some(mut media_file)) =
                            (current_creative.as_mut(), current_media_file.take())
                        {
                            media_file.url = text;
                            creative.media_files.push(media_file);
                        }
                    }
                    "Tracking" => {
                        if let (Some(creative), Some(event)) =
                            (current_creative.as_mut(), current_tracking_event.take())
                        {
                            if !text.is_empty() {
                                creative.tracking.push((event, text));
                            }
                        }
                    }
                    "ClickThrough" => {
                        if let Some(ref mut creative) = current_creative {
                            if !text.is_empty() {
                                creative.click_through = Some(text);
                            }
                        }
                    }
                    "ClickTracking" => {
                        if let Some(ref mut creative) = current_creative {
                            if !text.is_empty() {
                                creative.click_tracking.push(text);
                            }
                        }
                    }
                    _ => {}
                }
                current_text.clear();
            }

            Ok(Event::Text(e)) => {
                if let Ok(text) = e.unescape() {
                    current_text.push_str(&text);
                }
            }

            Ok(Event::CData(e)) => {
                current_text.push_str(&String::from_utf8_lossy(&e));
            }

            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(Error::VastParse(e.to_string())),
        }
    }

    Ok(doc)
}

/// Parse a VAST duration ("HH:MM:SS" or "HH:MM:SS.mmm") into seconds
fn parse_duration(s: &str) -> Option<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let minutes: f64 = parts[1].parse().ok()?;
    let seconds: f64 = parts[2].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Resolve a `skipoffset` value against the creative duration.
/// Accepts "HH:MM:SS", plain seconds, or a percentage of the duration.
fn parse_skip_offset(s: &str, duration: f64) -> Option<f64> {
    let s = s.trim();
    if let Some(percent) = s.strip_suffix('%') {
        let percent: f64 = percent.parse().ok()?;
        return Some(duration * percent / 100.0);
    }
    if s.contains(':') {
        return parse_duration(s);
    }
    s.parse().ok()
}

/// Select the playable creative from a parsed response.
///
/// Policy: the first ad in response order with at least one creative; within
/// it, the first linear creative exposing a media file with a non-empty URL.
/// Returns `None` for empty pods or ads without playable media, which is a
/// graceful no-ad outcome, never an error.
pub fn select_creative(doc: &VastDocument, default_skip_delay: f64) -> Option<AdCreative> {
    let ad = doc.ads.iter().find(|ad| !ad.creatives.is_empty())?;

    let creative = ad
        .creatives
        .iter()
        .find(|c| c.linear && c.media_files.iter().any(|mf| !mf.url.is_empty()))?;

    let media_file = creative.media_files.iter().find(|mf| !mf.url.is_empty())?;
    let media_file_url = match Url::parse(&media_file.url) {
        Ok(url) => url,
        Err(e) => {
            debug!(url = %media_file.url, error = %e, "unparseable media file URL, no ad");
            return None;
        }
    };

    let duration = creative.duration_seconds.unwrap_or(30.0);
    let skip_delay = creative
        .skip_offset
        .as_deref()
        .and_then(|s| parse_skip_offset(s, duration))
        .unwrap_or(default_skip_delay);

    let mut tracking = TrackingUrls {
        impression: parse_urls(&ad.impressions),
        click: parse_urls(&creative.click_tracking),
        ..Default::default()
    };
    for (event, uri) in &creative.tracking {
        if let Ok(url) = Url::parse(uri) {
            match event.as_str() {
                "firstQuartile" => tracking.first_quartile.push(url),
                "midpoint" => tracking.midpoint.push(url),
                "thirdQuartile" => tracking.third_quartile.push(url),
                "complete" => tracking.complete.push(url),
                "skip" => tracking.skip.push(url),
                _ => {}
            }
        }
    }

    Some(AdCreative {
        media_file_url,
        duration_seconds: duration,
        skip_delay_seconds: skip_delay,
        click_through_url: creative
            .click_through
            .as_deref()
            .and_then(|u| Url::parse(u).ok()),
        tracking,
    })
}

fn parse_urls(raw: &[String]) -> Vec<Url> {
    raw.iter().filter_map(|u| Url::parse(u).ok()).collect()
}
