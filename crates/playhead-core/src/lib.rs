//! Playhead Core - Playback orchestration library
//!
//! This crate provides the playback engine behind Playhead:
//! - Media item and queue model with src-based identity
//! - Provider adapters (native HTML5 video, DASH/MSE, iframe embeds)
//! - VAST ad resolution, quartile tracking, and skip handling
//! - The playback session state machine that sequences ads around primary
//!   content
//! - Live channel and timeshift/DVR resolution with a program guide
//!   timeline
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        Playhead Core                           │
//! ├────────────────────────────────────────────────────────────────┤
//! │                                                                │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐          │
//! │  │     VAST     │  │      Ad      │  │  Live / DVR  │          │
//! │  │    Parser    │  │  Controller  │  │   Resolver   │          │
//! │  └──────┬───────┘  └──────┬───────┘  └──────────────┘          │
//! │         │                 │                                    │
//! │         └────────┬────────┘                                    │
//! │                  │                                             │
//! │           ┌──────┴──────┐                                      │
//! │           │   Player    │                                      │
//! │           │   Session   │                                      │
//! │           └──────┬──────┘                                      │
//! │                  │                                             │
//! │  ┌──────────────┐│┌──────────────┐  ┌──────────────┐           │
//! │  │  HTML Video  │││    DASH      │  │    Embed     │           │
//! │  │   Adapter    │││   Adapter    │  │   Adapter    │           │
//! │  └──────┬───────┘│└──────┬───────┘  └──────┬───────┘           │
//! │         └────────┴───────┴─────────────────┘                   │
//! │                  │                                             │
//! │           ┌──────┴──────┐                                      │
//! │           │    Media    │                                      │
//! │           │   Surface   │                                      │
//! │           └─────────────┘                                      │
//! └────────────────────────────────────────────────────────────────┘
//! ```

pub mod ads;
pub mod error;
pub mod live;
pub mod provider;
pub mod session;
pub mod surface;
pub mod types;
pub mod vast;

pub use ads::{AdController, AdSession, AdType};
pub use error::{Error, Result};
pub use provider::{guess_provider, ProviderAdapter, ProviderEvent};
pub use session::{PlaybackState, PlayerEvent, PlayerSession};
pub use surface::{MediaSurface, SurfaceCapabilities, SurfaceEvent};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Playhead Core initialized");
}
