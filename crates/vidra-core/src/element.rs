//! Presentation element boundary
//!
//! The rendering surface is owned by the host. The core only needs the narrow,
//! DOM-shaped capability set described by [`MediaElement`].

use crate::types::{ErrorMetadata, ErrorPayload};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Callback attached to an element or engine event
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by listener registration, used to detach it again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// A contiguous buffered time range, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Inclusive on both ends, like `TimeRanges` lookups in browsers
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// Media events the core listens for on the presentation element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaEvent {
    LoadStart,
    CanPlay,
    Playing,
    Pause,
    Seeking,
    Waiting,
    Ended,
    TimeUpdate,
    Error,
}

impl MediaEvent {
    pub const ALL: [MediaEvent; 9] = [
        MediaEvent::LoadStart,
        MediaEvent::CanPlay,
        MediaEvent::Playing,
        MediaEvent::Pause,
        MediaEvent::Seeking,
        MediaEvent::Waiting,
        MediaEvent::Ended,
        MediaEvent::TimeUpdate,
        MediaEvent::Error,
    ];

    /// DOM event name
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaEvent::LoadStart => "loadstart",
            MediaEvent::CanPlay => "canplay",
            MediaEvent::Playing => "playing",
            MediaEvent::Pause => "pause",
            MediaEvent::Seeking => "seeking",
            MediaEvent::Waiting => "waiting",
            MediaEvent::Ended => "ended",
            MediaEvent::TimeUpdate => "timeupdate",
            MediaEvent::Error => "error",
        }
    }
}

impl std::fmt::Display for MediaEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symbolic `MediaError` codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaErrorCode {
    Aborted,
    Network,
    Decode,
    SrcNotSupported,
    Unknown,
}

impl MediaErrorCode {
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => MediaErrorCode::Aborted,
            2 => MediaErrorCode::Network,
            3 => MediaErrorCode::Decode,
            4 => MediaErrorCode::SrcNotSupported,
            _ => MediaErrorCode::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaErrorCode::Aborted => "ABORTED",
            MediaErrorCode::Network => "NETWORK",
            MediaErrorCode::Decode => "DECODE",
            MediaErrorCode::SrcNotSupported => "SRC_NOT_SUPPORTED",
            MediaErrorCode::Unknown => "UNKNOWN",
        }
    }
}

/// Error state of the presentation element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaError {
    pub code: u16,
    pub message: String,
}

impl MediaError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn symbolic(&self) -> MediaErrorCode {
        MediaErrorCode::from_code(self.code)
    }
}

/// Element errors always stop playback, so they are reported as fatal
impl From<&MediaError> for ErrorMetadata {
    fn from(error: &MediaError) -> Self {
        let symbolic = error.symbolic();
        let details = if error.message.is_empty() {
            symbolic.as_str().to_string()
        } else {
            error.message.clone()
        };
        ErrorMetadata {
            error_type: symbolic.as_str().to_string(),
            details,
            fatal: true,
            payload: ErrorPayload::Native { code: error.code },
        }
    }
}

/// The presentation element the core attaches to.
///
/// Methods take `&self`: elements are shared between the controller, the
/// active instance and, for HLS/DASH, the streaming engine, and mutate
/// internally the way a DOM node does.
#[async_trait]
pub trait MediaElement: Send + Sync {
    /// Current source URL, empty when none
    fn src(&self) -> String;

    /// Assign a source URL; an empty string clears it
    fn set_src(&self, src: &str);

    /// Start playback; resolves once playback has started and fails with
    /// [`Error::PlaybackRejected`](crate::Error::PlaybackRejected) when the
    /// host blocks it
    async fn play(&self) -> Result<()>;

    fn pause(&self);

    /// Reset the element and re-run resource selection
    fn load(&self);

    /// Buffered ranges, ordered and non-overlapping
    fn buffered(&self) -> Vec<TimeRange>;

    /// Playhead position in seconds
    fn current_time(&self) -> f64;

    fn error(&self) -> Option<MediaError>;

    fn add_event_listener(&self, event: MediaEvent, listener: Listener) -> ListenerId;

    fn remove_event_listener(&self, event: MediaEvent, id: ListenerId);
}
