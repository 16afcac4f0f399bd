//! Vidra Core - Playback backend abstraction for streaming video
//!
//! This crate picks a playback technology for a media URL and drives it
//! through one lifecycle and event interface:
//! - Source type detection (content-type probe, then URL extension)
//! - Native, DASH and HLS playback instances behind one contract
//! - A unified playback state machine and event normalization
//! - Buffer-health introspection
//! - Error normalization across backends
//!
//! Manifest parsing, ABR and segment fetching belong to the streaming
//! engines, which are injected through [`EngineProviders`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Vidra Core                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐         ┌──────────────────────────┐          │
//! │  │    Source    │────────▶│    PlaybackController    │          │
//! │  │   Detector   │         │  state · buffer · events │          │
//! │  └──────────────┘         └────────────┬─────────────┘          │
//! │                                        │                        │
//! │                           ┌────────────┴─────────────┐          │
//! │                           │     InstanceFactory      │          │
//! │                           └────────────┬─────────────┘          │
//! │                                        │                        │
//! │        ┌───────────────────────────────┼──────────────┐         │
//! │        │                               │              │         │
//! │  ┌─────┴────────┐  ┌───────────────────┴┐  ┌──────────┴───┐     │
//! │  │    Native    │  │        DASH        │  │     HLS      │     │
//! │  │   Instance   │  │      Instance      │  │   Instance   │     │
//! │  └──────┬───────┘  └─────────┬──────────┘  └──────┬───────┘     │
//! │         │                    │                    │             │
//! │  ┌──────┴────────────────────┴────────────────────┴──────┐      │
//! │  │  MediaElement  ·  DashEngine  ·  HlsEngine  (traits)  │      │
//! │  └───────────────────────────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod types;
pub mod detect;
pub mod emitter;
pub mod element;
pub mod engine;
pub mod instance;
pub mod factory;
pub mod player;
pub mod memory;

pub use error::{Error, Result};
pub use types::*;
#[cfg(feature = "http-probe")]
pub use detect::HttpProbe;
pub use detect::{classify_content_type, classify_extension, SourceProbe, SourceTypeDetector};
pub use emitter::{EventEmitter, EventKind, HandlerId, PlaybackEvent};
pub use element::{MediaElement, MediaError, MediaErrorCode, MediaEvent, TimeRange};
pub use engine::{DashEngine, DashEvent, EngineError, EngineProviders, HlsEngine, HlsEvent};
pub use instance::{buffer_at, PlaybackInstance};
pub use factory::InstanceFactory;
pub use player::PlaybackController;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log library startup
pub fn init() {
    tracing::info!(version = VERSION, "Vidra Core initialized");
}
