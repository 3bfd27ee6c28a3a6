//! Live channels, program guides, and timeshift resolution
//!
//! Channels stream live by default; channels with an archive window can be
//! played back from any point inside it through a DVR endpoint. The program
//! guide lays each broadcast day out on a 24-hour timeline that starts at
//! 06:00, so late-night programming stays attached to the day it belongs to.

use crate::provider::guess_provider;
use crate::{Error, MediaItem, Result};
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Hour of day the guide timeline starts at
pub const WINDOW_START_HOUR: u32 = 6;

/// Length of one guide window in seconds
pub const WINDOW_SECONDS: i64 = 86_400;

/// Ad configuration attached to a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelVast {
    pub url: Url,
}

/// A live channel as served by the channel listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub cover: Option<Url>,
    /// Live stream URL
    pub stream: Url,
    /// Days of timeshift archive available; zero means live only
    #[serde(default)]
    pub archive_days: u32,
    pub vast: Option<ChannelVast>,
}

impl Channel {
    pub fn supports_timeshift(&self) -> bool {
        self.archive_days > 0
    }

    /// Build a fresh media item for a resolved stream URL. A new item per
    /// selection: cueing works off src identity, so reusing one would make
    /// a live-to-archive switch look like a no-op.
    pub fn media_item(&self, src: Url) -> MediaItem {
        let mut item = MediaItem::new(
            format!("channel-{}", self.id),
            guess_provider(&src),
            src,
        );
        if let Some(poster) = &self.cover {
            item = item.with_poster(poster.clone());
        }
        if let Some(vast) = &self.vast {
            item = item.with_vast_url(vast.url.clone());
        }
        item
    }
}

/// One guide entry. Times are epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub title: String,
    pub start: i64,
    pub stop: i64,
    pub channel: String,
}

impl Program {
    pub fn contains(&self, timestamp: i64) -> bool {
        self.start <= timestamp && timestamp < self.stop
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.stop - self.start).max(0)
    }
}

/// Fetch the channel listing
pub async fn fetch_channels(client: &reqwest::Client, url: &Url) -> Result<Vec<Channel>> {
    let channels: Vec<Channel> = client.get(url.clone()).send().await?.json().await?;
    debug!(count = channels.len(), "channel listing fetched");
    Ok(channels)
}

/// Fetch the program guide for a channel
pub async fn fetch_programs(client: &reqwest::Client, url: &Url) -> Result<Vec<Program>> {
    let programs: Vec<Program> = client.get(url.clone()).send().await?.json().await?;
    debug!(count = programs.len(), "program guide fetched");
    Ok(programs)
}

/// Resolves a channel plus an optional archive range to a stream URL
#[derive(Debug, Clone)]
pub struct TimeshiftResolver {
    dvr_base: Url,
}

impl TimeshiftResolver {
    pub fn new(dvr_base: Url) -> Self {
        Self { dvr_base }
    }

    /// The live stream for a channel
    pub fn live(&self, channel: &Channel) -> Url {
        channel.stream.clone()
    }

    /// An archive stream starting at `start`, validated against the
    /// channel's archive window. Without `end` the stream runs from `start`
    /// to the live edge.
    pub fn timeshift(
        &self,
        channel: &Channel,
        start: i64,
        end: Option<i64>,
        now: i64,
    ) -> Result<Url> {
        if !channel.supports_timeshift() {
            return Err(Error::InvalidConfig(format!(
                "channel {} has no archive",
                channel.id
            )));
        }
        if let Some(end) = end {
            if end <= start {
                return Err(Error::InvalidConfig(format!(
                    "empty archive range {start}..{end}"
                )));
            }
        }
        let horizon = now - i64::from(channel.archive_days) * WINDOW_SECONDS;
        if start < horizon {
            return Err(Error::InvalidConfig(format!(
                "archive range starts before the {}-day horizon",
                channel.archive_days
            )));
        }

        let mut url = self.dvr_base.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("start", &start.to_string());
            if let Some(end) = end {
                pairs.append_pair("end", &end.to_string());
            }
            pairs.append_pair("id", &channel.id);
        }
        debug!(channel = %channel.id, start, ?end, "timeshift URL built");
        Ok(url)
    }

    /// Archive stream for a point picked on the guide timeline.
    ///
    /// The percentage maps back to a timestamp inside the window; if a guide
    /// entry covers that timestamp the whole program is played, otherwise the
    /// stream runs open-ended from the picked moment to the live edge.
    pub fn timeline_selection(
        &self,
        channel: &Channel,
        programs: &[Program],
        window_start: i64,
        percent: f64,
        now: i64,
    ) -> Result<Url> {
        let timestamp = position_to_timestamp(window_start, percent);
        match program_at(programs, timestamp) {
            Some(program) => {
                debug!(channel = %channel.id, title = %program.title, "timeline pick resolved to program");
                self.timeshift(channel, program.start, Some(program.stop), now)
            }
            None => self.timeshift(channel, timestamp, None, now),
        }
    }

    /// Live when no start is given, otherwise the matching archive stream
    pub fn resolve(
        &self,
        channel: &Channel,
        start: Option<i64>,
        end: Option<i64>,
        now: i64,
    ) -> Result<Url> {
        match start {
            None => Ok(self.live(channel)),
            Some(start) => self.timeshift(channel, start, end, now),
        }
    }
}

/// Start of the guide window containing `date`, as epoch seconds.
///
/// The window for a broadcast day runs 06:00 that day to 06:00 the next.
pub fn window_start(date: NaiveDate) -> i64 {
    Utc.with_ymd_and_hms(date.year(), date.month(), date.day(), WINDOW_START_HOUR, 0, 0)
        .single()
        .map(|dt| dt.timestamp())
        .unwrap_or_default()
}

/// The broadcast day a timestamp belongs to. Anything before 06:00 counts
/// toward the previous day.
pub fn broadcast_day(timestamp: i64) -> NaiveDate {
    let dt: DateTime<Utc> = Utc
        .timestamp_opt(timestamp, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).unwrap());
    let date = dt.date_naive();
    if dt.hour() < WINDOW_START_HOUR {
        date.pred_opt().unwrap_or(date)
    } else {
        date
    }
}

/// Position of a timestamp on the day timeline, as a percentage.
///
/// Anchored arithmetic, not wrap-around: 06:00 at the window start is 0%,
/// 18:00 is 50%, and 06:00 the next day is 100%. Timestamps outside the
/// window clamp to the edges.
pub fn timeline_position(window_start: i64, timestamp: i64) -> f64 {
    let offset = (timestamp - window_start) as f64;
    (offset / WINDOW_SECONDS as f64 * 100.0).clamp(0.0, 100.0)
}

/// Inverse of [`timeline_position`]: the timestamp at a timeline percentage
pub fn position_to_timestamp(window_start: i64, percent: f64) -> i64 {
    let percent = percent.clamp(0.0, 100.0);
    window_start + (percent / 100.0 * WINDOW_SECONDS as f64).round() as i64
}

/// Progress of a whole guide window relative to `now`: fully elapsed days
/// read 100%, future days 0%, today its current position.
pub fn window_progress(window_start: i64, now: i64) -> f64 {
    if now >= window_start + WINDOW_SECONDS {
        100.0
    } else if now < window_start {
        0.0
    } else {
        timeline_position(window_start, now)
    }
}

/// The program covering a timestamp. Overlapping entries resolve to the one
/// that started latest, matching how guide corrections are published.
pub fn program_at(programs: &[Program], timestamp: i64) -> Option<&Program> {
    programs
        .iter()
        .filter(|p| p.contains(timestamp))
        .max_by_key(|p| p.start)
}

/// Epoch seconds as a "HH:MM" wall clock in UTC
pub fn format_clock(timestamp: i64) -> String {
    match Utc.timestamp_opt(timestamp, 0).single() {
        Some(dt) => format!("{:02}:{:02}", dt.hour(), dt.minute()),
        None => "--:--".to_string(),
    }
}

/// Archive dates selectable for a channel, newest first, bounded by its
/// archive window. Today is included as the first entry.
pub fn past_dates(today: NaiveDate, archive_days: u32) -> Vec<NaiveDate> {
    (0..=i64::from(archive_days))
        .filter_map(|days_back| today.checked_sub_signed(ChronoDuration::days(days_back)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(archive_days: u32) -> Channel {
        Channel {
            id: "one".into(),
            name: "Channel One".into(),
            cover: None,
            stream: Url::parse("https://live.example.com/one.m3u8").unwrap(),
            archive_days,
            vast: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_channel_deserializes_from_listing_shape() {
        let json = r#"{
            "id": "one",
            "name": "Channel One",
            "cover": "https://cdn.example.com/one.png",
            "stream": "https://live.example.com/one.m3u8",
            "archiveDays": 7,
            "vast": {"url": "https://ads.example.com/tag"}
        }"#;
        let channel: Channel = serde_json::from_str(json).unwrap();
        assert_eq!(channel.archive_days, 7);
        assert!(channel.supports_timeshift());
        assert_eq!(
            channel.vast.unwrap().url.host_str(),
            Some("ads.example.com")
        );
    }

    #[test]
    fn test_archive_days_defaults_to_live_only() {
        let json = r#"{"id":"x","name":"X","cover":null,"stream":"https://live.example.com/x.m3u8","vast":null}"#;
        let channel: Channel = serde_json::from_str(json).unwrap();
        assert_eq!(channel.archive_days, 0);
        assert!(!channel.supports_timeshift());
    }

    #[test]
    fn test_resolver_live_and_timeshift() {
        let resolver = TimeshiftResolver::new(Url::parse("https://dvr.example.com/play").unwrap());
        let ch = channel(7);
        let now = 1_700_000_000;

        assert_eq!(resolver.resolve(&ch, None, None, now).unwrap(), ch.stream);

        let url = resolver
            .resolve(&ch, Some(now - 7200), Some(now - 3600), now)
            .unwrap();
        let query = url.query().unwrap();
        assert!(query.contains(&format!("start={}", now - 7200)));
        assert!(query.contains(&format!("end={}", now - 3600)));
        assert!(query.contains("id=one"));

        // open-ended range plays from start to the live edge
        let open = resolver.resolve(&ch, Some(now - 7200), None, now).unwrap();
        assert!(open.query().unwrap().contains("start="));
        assert!(!open.query().unwrap().contains("end="));
    }

    #[test]
    fn test_timeshift_rejections() {
        let resolver = TimeshiftResolver::new(Url::parse("https://dvr.example.com/play").unwrap());
        let now = 1_700_000_000;

        // live-only channel
        assert!(resolver
            .timeshift(&channel(0), now - 100, Some(now), now)
            .is_err());
        // empty range
        assert!(resolver.timeshift(&channel(7), now, Some(now), now).is_err());
        // beyond the archive horizon
        let too_old = now - 8 * WINDOW_SECONDS;
        assert!(resolver
            .timeshift(&channel(7), too_old, Some(too_old + 3600), now)
            .is_err());
    }

    #[test]
    fn test_timeline_selection_snaps_to_program_bounds() {
        let resolver = TimeshiftResolver::new(Url::parse("https://dvr.example.com/play").unwrap());
        let ch = channel(7);
        let anchor = window_start(date(2024, 3, 10));
        let now = anchor + WINDOW_SECONDS;

        let programs = vec![Program {
            title: "Evening News".into(),
            start: anchor + 12 * 3600,
            stop: anchor + 13 * 3600,
            channel: "one".into(),
        }];

        // 50% lands at 18:00, inside the program: play its full range
        let url = resolver
            .timeline_selection(&ch, &programs, anchor, 50.0, now)
            .unwrap();
        let query = url.query().unwrap();
        assert!(query.contains(&format!("start={}", anchor + 12 * 3600)));
        assert!(query.contains(&format!("end={}", anchor + 13 * 3600)));

        // 75% lands in a guide gap: open-ended from the picked moment
        let url = resolver
            .timeline_selection(&ch, &programs, anchor, 75.0, now)
            .unwrap();
        let query = url.query().unwrap();
        assert!(query.contains(&format!("start={}", anchor + 18 * 3600)));
        assert!(!query.contains("end="));
    }

    #[test]
    fn test_media_item_is_fresh_per_selection() {
        let mut ch = channel(7);
        ch.vast = Some(ChannelVast {
            url: Url::parse("https://ads.example.com/tag").unwrap(),
        });

        let live_item = ch.media_item(ch.stream.clone());
        let archive_item =
            ch.media_item(Url::parse("https://dvr.example.com/play?start=1&id=one").unwrap());

        assert_eq!(live_item.vast_url, archive_item.vast_url);
        assert!(!live_item.is_same(&archive_item));
    }

    #[test]
    fn test_timeline_anchor_points() {
        let anchor = window_start(date(2024, 3, 10));

        assert_eq!(timeline_position(anchor, anchor), 0.0);
        assert_eq!(timeline_position(anchor, anchor + 12 * 3600), 50.0);
        assert_eq!(timeline_position(anchor, anchor + 24 * 3600), 100.0);
        // clamped, never wrapped
        assert_eq!(timeline_position(anchor, anchor - 3600), 0.0);
        assert_eq!(timeline_position(anchor, anchor + 25 * 3600), 100.0);
    }

    #[test]
    fn test_position_timestamp_round_trip() {
        let anchor = window_start(date(2024, 3, 10));
        let t = anchor + 9 * 3600 + 1800;
        let pos = timeline_position(anchor, t);
        assert_eq!(position_to_timestamp(anchor, pos), t);
    }

    #[test]
    fn test_broadcast_day_splits_at_window_start() {
        let anchor = window_start(date(2024, 3, 10));
        // 05:59 belongs to the previous broadcast day
        assert_eq!(broadcast_day(anchor - 60), date(2024, 3, 9));
        assert_eq!(broadcast_day(anchor), date(2024, 3, 10));
        assert_eq!(broadcast_day(anchor + 23 * 3600), date(2024, 3, 10));
    }

    #[test]
    fn test_window_progress_edges() {
        let anchor = window_start(date(2024, 3, 10));
        assert_eq!(window_progress(anchor, anchor - 1), 0.0);
        assert_eq!(window_progress(anchor, anchor + WINDOW_SECONDS), 100.0);
        assert_eq!(window_progress(anchor, anchor + 6 * 3600), 25.0);
    }

    #[test]
    fn test_program_at_prefers_latest_start() {
        let programs = vec![
            Program {
                title: "Morning Show".into(),
                start: 1000,
                stop: 2000,
                channel: "one".into(),
            },
            Program {
                title: "Correction".into(),
                start: 1500,
                stop: 2000,
                channel: "one".into(),
            },
            Program {
                title: "Later".into(),
                start: 2000,
                stop: 3000,
                channel: "one".into(),
            },
        ];

        assert_eq!(program_at(&programs, 1200).unwrap().title, "Morning Show");
        assert_eq!(program_at(&programs, 1600).unwrap().title, "Correction");
        // stop is exclusive
        assert_eq!(program_at(&programs, 2000).unwrap().title, "Later");
        assert!(program_at(&programs, 5000).is_none());
    }

    #[test]
    fn test_format_clock() {
        // 2024-03-10 09:05:30 UTC
        let t = Utc
            .with_ymd_and_hms(2024, 3, 10, 9, 5, 30)
            .unwrap()
            .timestamp();
        assert_eq!(format_clock(t), "09:05");
    }

    #[test]
    fn test_past_dates_bounded_by_archive() {
        let dates = past_dates(date(2024, 3, 10), 3);
        assert_eq!(
            dates,
            vec![
                date(2024, 3, 10),
                date(2024, 3, 9),
                date(2024, 3, 8),
                date(2024, 3, 7),
            ]
        );
    }
}
