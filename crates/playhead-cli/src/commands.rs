//! CLI command implementations

use crate::output;
use chrono::Utc;
use playhead_core::guess_provider;
use playhead_core::live::{self, fetch_channels, TimeshiftResolver};
use playhead_core::vast::{parse_vast, select_creative};
use url::Url;

/// Fetch a VAST tag and report the creative that would play
pub async fn vast(tag: &str, skip_delay: f64, format: &str) -> anyhow::Result<()> {
    let url = Url::parse(tag)?;
    println!("Probing VAST tag: {url}");

    let body = reqwest::get(url).await?.text().await?;
    let doc = parse_vast(&body)?;
    println!("  Ads in response: {}", doc.ads.len());

    match select_creative(&doc, skip_delay) {
        Some(creative) => {
            if format == "json" {
                println!("{}", output::to_json(&creative));
                return Ok(());
            }
            println!("\nSelected creative:");
            println!("  Media file: {}", creative.media_file_url);
            println!("  Duration: {}s", creative.duration_seconds);
            println!("  Skippable after: {}s", creative.skip_delay_seconds);
            match &creative.click_through_url {
                Some(url) => println!("  Click-through: {url}"),
                None => println!("  Click-through: none"),
            }
            println!("\nTracking URLs:");
            println!("  Impression: {}", creative.tracking.impression.len());
            println!("  First quartile: {}", creative.tracking.first_quartile.len());
            println!("  Midpoint: {}", creative.tracking.midpoint.len());
            println!("  Third quartile: {}", creative.tracking.third_quartile.len());
            println!("  Complete: {}", creative.tracking.complete.len());
            println!("  Skip: {}", creative.tracking.skip.len());
        }
        None => println!("\nNo playable creative - playback would skip the ad break"),
    }

    Ok(())
}

/// Fetch and display a channel listing
pub async fn channels(url: &str, format: &str) -> anyhow::Result<()> {
    let url = Url::parse(url)?;
    let client = reqwest::Client::new();
    let channels = fetch_channels(&client, &url).await?;

    if format == "json" {
        println!("{}", output::to_json(&channels));
        return Ok(());
    }

    println!("Channels: {}", channels.len());
    for (i, channel) in channels.iter().enumerate() {
        println!(
            "  {}. {} ({}) - archive {}d{}",
            i + 1,
            channel.name,
            channel.id,
            channel.archive_days,
            if channel.vast.is_some() { ", ads" } else { "" },
        );
    }

    Ok(())
}

/// Build a timeshift/DVR playback URL for a channel
pub async fn dvr(
    url: &str,
    channel_id: &str,
    dvr_base: &str,
    start: i64,
    end: i64,
) -> anyhow::Result<()> {
    let url = Url::parse(url)?;
    let client = reqwest::Client::new();
    let channels = fetch_channels(&client, &url).await?;

    let channel = channels
        .iter()
        .find(|c| c.id == channel_id)
        .ok_or_else(|| anyhow::anyhow!("channel '{channel_id}' not in listing"))?;

    let resolver = TimeshiftResolver::new(Url::parse(dvr_base)?);
    let playback = resolver.timeshift(channel, start, Some(end), Utc::now().timestamp())?;

    println!("Channel: {} ({})", channel.name, channel.id);
    println!("Live: {}", channel.stream);
    println!(
        "Archive {} - {}: {}",
        live::format_clock(start),
        live::format_clock(end),
        playback
    );

    Ok(())
}

/// Show where a timestamp falls on the guide timeline
pub fn timeline(timestamp: i64) -> anyhow::Result<()> {
    let day = live::broadcast_day(timestamp);
    let anchor = live::window_start(day);
    let position = live::timeline_position(anchor, timestamp);

    println!("Timestamp: {} ({} UTC)", timestamp, live::format_clock(timestamp));
    println!("Broadcast day: {day}");
    println!("Timeline position: {position:.2}%");

    Ok(())
}

/// Guess the provider a media URL would play through
pub fn probe(url: &str) -> anyhow::Result<()> {
    let url = Url::parse(url)?;
    println!("{} -> {}", url, guess_provider(&url));
    Ok(())
}
