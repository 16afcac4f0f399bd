//! Streaming engine boundary
//!
//! DASH and HLS engines are external capability providers. The core drives
//! them through [`DashEngine`] and [`HlsEngine`] and receives them from
//! [`EngineProviders`] injected at construction time.

use crate::element::{Listener, ListenerId, MediaElement};
use crate::types::{ErrorMetadata, ErrorPayload, TrackType};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Callback attached to an engine's `error` event
pub type ErrorListener = Arc<dyn Fn(&EngineError) + Send + Sync>;

/// Error as reported by a streaming engine
#[derive(Debug, Clone)]
pub struct EngineError {
    pub error_type: String,
    pub details: String,
    pub fatal: bool,
    pub error: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl EngineError {
    pub fn new(error_type: impl Into<String>, details: impl Into<String>, fatal: bool) -> Self {
        Self {
            error_type: error_type.into(),
            details: details.into(),
            fatal,
            error: None,
        }
    }

    pub fn with_source(mut self, error: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(error));
        self
    }
}

/// Engine errors are forwarded verbatim
impl From<&EngineError> for ErrorMetadata {
    fn from(error: &EngineError) -> Self {
        ErrorMetadata {
            error_type: error.error_type.clone(),
            details: error.details.clone(),
            fatal: error.fatal,
            payload: ErrorPayload::Engine {
                error: error.error.clone(),
            },
        }
    }
}

/// DASH engine events the core listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DashEvent {
    ManifestLoadingStarted,
    CanPlay,
    PlaybackPlaying,
    PlaybackPaused,
    PlaybackSeeking,
    FragmentLoadingStarted,
    PlaybackEnded,
    PlaybackTimeUpdated,
}

impl DashEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            DashEvent::ManifestLoadingStarted => "manifestLoadingStarted",
            DashEvent::CanPlay => "canPlay",
            DashEvent::PlaybackPlaying => "playbackPlaying",
            DashEvent::PlaybackPaused => "playbackPaused",
            DashEvent::PlaybackSeeking => "playbackSeeking",
            DashEvent::FragmentLoadingStarted => "fragmentLoadingStarted",
            DashEvent::PlaybackEnded => "playbackEnded",
            DashEvent::PlaybackTimeUpdated => "playbackTimeUpdated",
        }
    }
}

/// HLS engine events the core listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HlsEvent {
    ManifestLoading,
    ManifestParsed,
    FragLoading,
}

impl HlsEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HlsEvent::ManifestLoading => "hlsManifestLoading",
            HlsEvent::ManifestParsed => "hlsManifestParsed",
            HlsEvent::FragLoading => "hlsFragLoading",
        }
    }
}

/// A DASH streaming engine instance
#[async_trait]
pub trait DashEngine: Send + Sync {
    /// Bind the engine to the element and start loading `url`
    fn initialize(&self, element: Arc<dyn MediaElement>, url: &str);

    async fn play(&self) -> Result<()>;

    fn pause(&self);

    fn destroy(&self);

    /// Seconds buffered ahead for the given track
    fn buffer_length(&self, track: TrackType) -> f64;

    fn on(&self, event: DashEvent, listener: Listener) -> ListenerId;

    fn on_error(&self, listener: ErrorListener) -> ListenerId;

    fn off(&self, id: ListenerId);
}

/// An HLS streaming engine instance
pub trait HlsEngine: Send + Sync {
    fn load_source(&self, url: &str);

    fn attach_media(&self, element: Arc<dyn MediaElement>);

    fn detach_media(&self);

    fn stop_load(&self);

    fn destroy(&self);

    /// Seconds buffered ahead of the playhead
    fn buffer_length(&self) -> f64;

    fn on(&self, event: HlsEvent, listener: Listener) -> ListenerId;

    fn on_error(&self, listener: ErrorListener) -> ListenerId;

    fn off(&self, id: ListenerId);
}

/// Builds a fresh DASH engine, or `None` when the host has none available
pub type DashProvider = Arc<dyn Fn() -> Option<Arc<dyn DashEngine>> + Send + Sync>;

/// Builds a fresh HLS engine, or `None` when the host has none available
pub type HlsProvider = Arc<dyn Fn() -> Option<Arc<dyn HlsEngine>> + Send + Sync>;

/// Engine constructors available to the instance factory
#[derive(Clone, Default)]
pub struct EngineProviders {
    dash: Option<DashProvider>,
    hls: Option<HlsProvider>,
}

impl EngineProviders {
    /// No engines: only native playback is possible
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dash<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Option<Arc<dyn DashEngine>> + Send + Sync + 'static,
    {
        self.dash = Some(Arc::new(provider));
        self
    }

    pub fn with_hls<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Option<Arc<dyn HlsEngine>> + Send + Sync + 'static,
    {
        self.hls = Some(Arc::new(provider));
        self
    }

    pub fn dash(&self) -> Option<DashProvider> {
        self.dash.clone()
    }

    pub fn hls(&self) -> Option<HlsProvider> {
        self.hls.clone()
    }
}

impl std::fmt::Debug for EngineProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineProviders")
            .field("dash", &self.dash.is_some())
            .field("hls", &self.hls.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FragLoadError;

    impl std::fmt::Display for FragLoadError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("fragment request returned 404")
        }
    }

    impl std::error::Error for FragLoadError {}

    #[test]
    fn test_engine_error_forwarded_verbatim() {
        let error = EngineError::new("networkError", "fragLoadError", false).with_source(FragLoadError);
        let meta = ErrorMetadata::from(&error);

        assert_eq!(meta.error_type, "networkError");
        assert_eq!(meta.details, "fragLoadError");
        assert!(!meta.fatal);
        match meta.payload {
            ErrorPayload::Engine { error: Some(source) } => {
                assert_eq!(source.to_string(), "fragment request returned 404");
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_providers_default_empty() {
        let providers = EngineProviders::new();
        assert!(providers.dash().is_none());
        assert!(providers.hls().is_none());

        let providers = providers.with_hls(|| None);
        assert!(providers.hls().is_some());
        assert!(providers.hls().and_then(|provider| provider()).is_none());
    }
}
