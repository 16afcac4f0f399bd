//! Core types for Vidra

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a playback instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playback technology a media URL is classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Progressive download played by the presentation element itself
    Native,
    /// MPEG-DASH manifest
    Dash,
    /// HLS playlist
    Hls,
    /// Nothing matched
    Unknown,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Native => write!(f, "native"),
            SourceType::Dash => write!(f, "dash"),
            SourceType::Hls => write!(f, "hls"),
            SourceType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Normalized, backend-agnostic playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackState {
    /// No content, the element is empty
    Idle,
    /// Content is loading, playback has not started
    Loading,
    /// Content loaded, ready to play
    Ready,
    /// Playing
    Playing,
    /// Paused
    Paused,
    /// Seeking
    Seeking,
    /// Waiting for data
    Buffering,
    /// Playback reached the end
    Ended,
    /// Playback position advanced
    #[serde(rename = "TIMEUPDATE")]
    TimeUpdated,
}

impl PlaybackState {
    /// Time progress is a signal, not a state the controller settles in
    pub fn is_transient(&self) -> bool {
        matches!(self, PlaybackState::TimeUpdated)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Ready => write!(f, "ready"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Seeking => write!(f, "seeking"),
            PlaybackState::Buffering => write!(f, "buffering"),
            PlaybackState::Ended => write!(f, "ended"),
            PlaybackState::TimeUpdated => write!(f, "time-updated"),
        }
    }
}

/// Buffer health at the playhead
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BufferInfo {
    /// Seconds of contiguous playable media around the playhead
    pub length: f64,
}

impl BufferInfo {
    /// Nothing buffered at the playhead
    pub const EMPTY: BufferInfo = BufferInfo { length: 0.0 };

    /// Clamps negative and non-finite lengths to zero
    pub fn new(length: f64) -> Self {
        if length.is_finite() && length > 0.0 {
            Self { length }
        } else {
            Self::EMPTY
        }
    }
}

/// Track type queried for engine-side buffer levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Video,
    Audio,
}

impl TrackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackType::Video => "video",
            TrackType::Audio => "audio",
        }
    }
}

/// Backend-specific part of an error report
#[derive(Debug, Clone)]
pub enum ErrorPayload {
    /// `MediaError.code` of the presentation element
    Native { code: u16 },
    /// Underlying error object reported by a streaming engine
    Engine {
        error: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },
}

impl ErrorPayload {
    fn has_no_code(&self) -> bool {
        !matches!(self, ErrorPayload::Native { .. })
    }

    /// Only the native code goes on the wire; engine error objects stay in-process
    fn serialize_code<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            ErrorPayload::Native { code } => serializer.serialize_u16(*code),
            ErrorPayload::Engine { .. } => serializer.serialize_none(),
        }
    }
}

/// Which layer produced a runtime error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Decode, network or abort error of the presentation element
    Media,
    /// Error reported by the DASH or HLS engine
    Engine,
}

/// Normalized runtime error, delivered through the `error` event
#[derive(Debug, Clone, Serialize)]
pub struct ErrorMetadata {
    /// Error type code
    #[serde(rename = "type")]
    pub error_type: String,
    /// Human-readable details
    pub details: String,
    /// Whether playback cannot continue
    pub fatal: bool,
    /// Serialized as `code` for element errors, omitted for engine errors
    #[serde(
        rename = "code",
        skip_serializing_if = "ErrorPayload::has_no_code",
        serialize_with = "ErrorPayload::serialize_code"
    )]
    pub payload: ErrorPayload,
}

impl ErrorMetadata {
    pub fn category(&self) -> ErrorCategory {
        match self.payload {
            ErrorPayload::Native { .. } => ErrorCategory::Media,
            ErrorPayload::Engine { .. } => ErrorCategory::Engine,
        }
    }

    /// Native media error code, if this came from the presentation element
    pub fn native_code(&self) -> Option<u16> {
        match self.payload {
            ErrorPayload::Native { code } => Some(code),
            ErrorPayload::Engine { .. } => None,
        }
    }
}

/// Player configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Timeout of the content-type probe in milliseconds
    pub probe_timeout_ms: u64,
    /// Minimum interval between buffer-health samples in milliseconds
    pub buffer_sample_interval_ms: u64,
    /// Start playback as soon as the source is loaded
    pub autoplay: bool,
    /// Track type queried for the DASH buffer length
    pub dash_track: TrackType,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5000,
            buffer_sample_interval_ms: 1000,
            autoplay: true,
            dash_track: TrackType::Video,
        }
    }
}

impl PlayerConfig {
    /// Parse and validate a JSON configuration; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PlayerConfig =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.probe_timeout_ms == 0 {
            return Err(Error::InvalidConfig("probe_timeout_ms must be positive".into()));
        }
        if self.buffer_sample_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "buffer_sample_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn buffer_sample_interval(&self) -> Duration {
        Duration::from_millis(self.buffer_sample_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_state_serialization() {
        let json = serde_json::to_string(&PlaybackState::TimeUpdated).unwrap();
        assert_eq!(json, "\"TIMEUPDATE\"");
        let json = serde_json::to_string(&PlaybackState::Buffering).unwrap();
        assert_eq!(json, "\"BUFFERING\"");
        assert_eq!(PlaybackState::TimeUpdated.to_string(), "time-updated");
    }

    #[test]
    fn test_only_time_updated_is_transient() {
        assert!(PlaybackState::TimeUpdated.is_transient());
        assert!(!PlaybackState::Playing.is_transient());
        assert!(!PlaybackState::Idle.is_transient());
    }

    #[test]
    fn test_buffer_info_clamps() {
        assert_eq!(BufferInfo::new(-1.0), BufferInfo::EMPTY);
        assert_eq!(BufferInfo::new(f64::NAN), BufferInfo::EMPTY);
        assert_eq!(BufferInfo::new(2.5).length, 2.5);
    }

    #[test]
    fn test_config_from_json() {
        let config = PlayerConfig::from_json(r#"{"autoplay": false, "dash_track": "audio"}"#).unwrap();
        assert!(!config.autoplay);
        assert_eq!(config.dash_track, TrackType::Audio);
        assert_eq!(config.buffer_sample_interval_ms, 1000);

        let err = PlayerConfig::from_json(r#"{"buffer_sample_interval_ms": 0}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(PlayerConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_error_metadata_serialization() {
        let meta = ErrorMetadata {
            error_type: "networkError".into(),
            details: "fragLoadError".into(),
            fatal: false,
            payload: ErrorPayload::Engine { error: None },
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["type"], "networkError");
        assert_eq!(json["fatal"], false);
        assert!(json.get("code").is_none());
        assert_eq!(meta.category(), ErrorCategory::Engine);
        assert_eq!(meta.native_code(), None);
    }

    #[test]
    fn test_native_error_metadata_carries_code() {
        let meta = ErrorMetadata {
            error_type: "SRC_NOT_SUPPORTED".into(),
            details: "no supported source".into(),
            fatal: true,
            payload: ErrorPayload::Native { code: 4 },
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["type"], "SRC_NOT_SUPPORTED");
        assert_eq!(json["code"], 4);
        assert_eq!(json["fatal"], true);
        assert_eq!(meta.category(), ErrorCategory::Media);
    }
}
