//! Playback controller - owns the active instance for one element
//!
//! Coordinates:
//! - Source type detection and backend selection
//! - Instance lifecycle (init, attach, load, play, destroy)
//! - The unified playback state, published on a `watch` channel
//! - Throttled buffer-health sampling
//! - Re-publishing instance events to host listeners

#[cfg(feature = "http-probe")]
use crate::detect::HttpProbe;
use crate::detect::{SourceProbe, SourceTypeDetector};
use crate::element::MediaElement;
use crate::emitter::{EventEmitter, EventKind, HandlerId, PlaybackEvent};
use crate::engine::EngineProviders;
use crate::factory::InstanceFactory;
use crate::instance::{BufferSource, PlaybackInstance};
use crate::types::{BufferInfo, PlaybackState, PlayerConfig, SourceType};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Lets one event through per interval
#[derive(Debug)]
struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Drives playback of arbitrary URLs on one presentation element
pub struct PlaybackController {
    media: Arc<dyn MediaElement>,
    detector: SourceTypeDetector,
    factory: InstanceFactory,
    config: PlayerConfig,
    /// Active instance, at most one
    instance: Option<PlaybackInstance>,
    /// Controller handlers on the active instance's emitter
    subscriptions: Vec<(EventKind, HandlerId)>,
    state_tx: Arc<watch::Sender<PlaybackState>>,
    /// Last throttled buffer sample
    buffer_health: Arc<Mutex<Option<BufferInfo>>>,
    /// Host-facing events
    events: Arc<EventEmitter>,
}

impl PlaybackController {
    /// Create a controller that probes sources over HTTP
    #[cfg(feature = "http-probe")]
    pub fn new(
        media: Arc<dyn MediaElement>,
        providers: EngineProviders,
        config: PlayerConfig,
    ) -> Result<Self> {
        let probe = HttpProbe::new(&config)?;
        Self::with_probe(media, providers, config, Arc::new(probe))
    }

    /// Create a controller with a custom source probe
    pub fn with_probe(
        media: Arc<dyn MediaElement>,
        providers: EngineProviders,
        config: PlayerConfig,
        probe: Arc<dyn SourceProbe>,
    ) -> Result<Self> {
        config.validate()?;
        let (state_tx, _) = watch::channel(PlaybackState::Idle);

        Ok(Self {
            media,
            detector: SourceTypeDetector::new(probe),
            factory: InstanceFactory::new(providers, &config),
            config,
            instance: None,
            subscriptions: Vec::new(),
            state_tx: Arc::new(state_tx),
            buffer_health: Arc::new(Mutex::new(None)),
            events: Arc::new(EventEmitter::new()),
        })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        *self.state_tx.borrow()
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    /// Live buffer health of the active instance
    pub fn buffer(&self) -> BufferInfo {
        self.instance
            .as_ref()
            .map_or(BufferInfo::EMPTY, PlaybackInstance::buffer)
    }

    /// Last buffer sample taken on `time-updated`
    pub fn buffer_health(&self) -> Option<BufferInfo> {
        *self.buffer_health.lock()
    }

    /// Backend of the active instance
    pub fn source_type(&self) -> Option<SourceType> {
        self.instance.as_ref().map(PlaybackInstance::source_type)
    }

    pub fn instance(&self) -> Option<&PlaybackInstance> {
        self.instance.as_ref()
    }

    /// Listen to events of whichever instance is active
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&PlaybackEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, handler)
    }

    pub fn off(&self, kind: EventKind, id: Option<HandlerId>) {
        self.events.off(kind, id)
    }

    /// Detect, build and start playback of `url`.
    ///
    /// An empty `url` tears down the active instance. Loading while an
    /// instance is active fails; call [`destroy`](Self::destroy) first.
    #[instrument(skip(self))]
    pub async fn load(&mut self, url: &str) -> Result<()> {
        if url.is_empty() {
            info!("Empty source, resetting playback");
            self.destroy();
            return Ok(());
        }

        if let Some(active) = &self.instance {
            return Err(Error::invalid_state(format!(
                "instance {} is still active, destroy it before loading",
                active.id()
            )));
        }

        info!(url = url, "Loading content");
        let source_type = self.detector.detect(url).await;
        let mut instance = self.factory.create(source_type)?;
        info!(instance_id = %instance.id(), source_type = %source_type, "Backend selected");

        if let Err(e) = self.prepare(&mut instance, url) {
            warn!(instance_id = %instance.id(), error = %e, "Load failed, discarding instance");
            self.subscriptions.clear();
            instance.destroy();
            self.state_tx.send_replace(PlaybackState::Idle);
            return Err(e);
        }
        self.instance = Some(instance);

        if self.config.autoplay {
            self.play().await?;
        }
        Ok(())
    }

    fn prepare(&mut self, instance: &mut PlaybackInstance, url: &str) -> Result<()> {
        instance.init()?;
        instance.attach_media(self.media.clone())?;
        // Subscribe before load so the first backend events are seen
        self.subscriptions = self.subscribe(instance);
        instance.load(url)
    }

    fn subscribe(&self, instance: &PlaybackInstance) -> Vec<(EventKind, HandlerId)> {
        let instance_id = instance.id();
        let state_tx = self.state_tx.clone();
        let buffer_health = self.buffer_health.clone();
        let buffer_source: BufferSource = instance.buffer_source();
        let throttle = Mutex::new(Throttle::new(self.config.buffer_sample_interval()));
        let events = self.events.clone();

        let on_state = instance.on(EventKind::PlaybackState, move |event| {
            let PlaybackEvent::PlaybackState { state } = event else {
                return;
            };
            if *state == PlaybackState::TimeUpdated {
                if throttle.lock().ready(Instant::now()) {
                    let sample = buffer_source.read();
                    *buffer_health.lock() = Some(sample);
                    debug!(instance_id = %instance_id, buffer = sample.length, "Buffer sampled");
                }
            } else {
                let previous = state_tx.send_replace(*state);
                debug!(instance_id = %instance_id, from = %previous, to = %state, "State updated");
            }
            events.emit(event.clone());
        });

        let events = self.events.clone();
        let on_error = instance.on(EventKind::Error, move |event| {
            let PlaybackEvent::Error(meta) = event else {
                return;
            };
            if meta.fatal {
                warn!(
                    instance_id = %instance_id,
                    error_type = %meta.error_type,
                    details = %meta.details,
                    "Fatal playback error"
                );
            } else {
                debug!(instance_id = %instance_id, error_type = %meta.error_type, "Recoverable playback error");
            }
            events.emit(event.clone());
        });

        vec![(EventKind::PlaybackState, on_state), (EventKind::Error, on_error)]
    }

    /// Tear down the active instance and return to `Idle`
    pub fn destroy(&mut self) {
        if let Some(mut instance) = self.instance.take() {
            for (kind, id) in self.subscriptions.drain(..) {
                instance.off(kind, Some(id));
            }
            instance.destroy();
            info!(instance_id = %instance.id(), "Playback destroyed");
        }
        *self.buffer_health.lock() = None;
        self.state_tx.send_replace(PlaybackState::Idle);
    }

    /// Start or resume playback.
    ///
    /// A rejection keeps the instance loaded so the host can retry after a
    /// user gesture.
    #[instrument(skip(self))]
    pub async fn play(&self) -> Result<()> {
        let instance = self.active()?;
        match instance.play().await {
            Err(e @ Error::PlaybackRejected(_)) => {
                warn!(instance_id = %instance.id(), error = %e, "Play request rejected");
                Err(e)
            }
            result => result,
        }
    }

    pub fn pause(&self) -> Result<()> {
        self.active()?.pause()
    }

    #[instrument(skip(self))]
    pub async fn seek_to(&self, position: f64) -> Result<()> {
        self.active()?.seek_to(position).await
    }

    fn active(&self) -> Result<&PlaybackInstance> {
        self.instance
            .as_ref()
            .ok_or_else(|| Error::invalid_state("no source loaded"))
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &self.state())
            .field("instance", &self.instance)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{MediaEvent, TimeRange};
    use crate::engine::{DashEvent, EngineError};
    use crate::memory::{MemoryDashEngine, MemoryMediaElement, StaticProbe};

    #[test]
    fn test_throttle_allows_one_per_interval() {
        let mut throttle = Throttle::new(Duration::from_millis(1000));
        let start = Instant::now();

        assert!(throttle.ready(start));
        assert!(!throttle.ready(start + Duration::from_millis(10)));
        assert!(!throttle.ready(start + Duration::from_millis(999)));
        assert!(throttle.ready(start + Duration::from_millis(1000)));
        assert!(!throttle.ready(start + Duration::from_millis(1500)));
    }

    fn controller(element: &Arc<MemoryMediaElement>, probe: StaticProbe) -> PlaybackController {
        PlaybackController::with_probe(
            element.clone(),
            EngineProviders::new(),
            PlayerConfig::default(),
            Arc::new(probe),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_time_updates_sample_buffer_without_state_change() {
        let element = Arc::new(MemoryMediaElement::new());
        element.set_buffered(vec![TimeRange::new(0.0, 12.0)]);
        element.set_current_time(4.0);
        let mut player = controller(&element, StaticProbe::content_type("video/mp4"));

        player.load("https://cdn.example.com/clip").await.unwrap();
        element.dispatch(MediaEvent::Playing);
        assert_eq!(player.buffer_health(), None);

        for _ in 0..20 {
            element.dispatch(MediaEvent::TimeUpdate);
        }

        assert_eq!(player.state(), PlaybackState::Playing);
        assert_eq!(player.buffer_health(), Some(BufferInfo::new(12.0)));
        assert_eq!(player.buffer().length, 12.0);
    }

    #[tokio::test]
    async fn test_burst_takes_single_sample() {
        let element = Arc::new(MemoryMediaElement::new());
        element.set_buffered(vec![TimeRange::new(0.0, 5.0)]);
        element.set_current_time(1.0);
        let mut player = controller(&element, StaticProbe::none());

        player.load("clip.mp4").await.unwrap();
        element.dispatch(MediaEvent::TimeUpdate);
        assert_eq!(player.buffer_health(), Some(BufferInfo::new(5.0)));

        // Within the interval the cached sample is kept
        element.set_buffered(vec![TimeRange::new(0.0, 9.0)]);
        element.dispatch(MediaEvent::TimeUpdate);
        assert_eq!(player.buffer_health(), Some(BufferInfo::new(5.0)));
    }

    #[tokio::test]
    async fn test_failed_init_discards_instance() {
        let element = Arc::new(MemoryMediaElement::new());
        let mut player = controller(&element, StaticProbe::content_type("application/dash+xml"));

        let err = player.load("https://cdn.example.com/manifest").await.unwrap_err();

        assert!(matches!(err, Error::BackendUnavailable { backend: "dash" }));
        assert!(player.instance().is_none());
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(element.total_listeners(), 0);
    }

    #[tokio::test]
    async fn test_unknown_source_is_unsupported() {
        let element = Arc::new(MemoryMediaElement::new());
        let mut player = controller(&element, StaticProbe::content_type("text/html"));

        let err = player.load("https://example.com/").await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedSourceType(SourceType::Unknown)));
        assert!(player.source_type().is_none());
    }

    #[tokio::test]
    async fn test_operations_without_instance_are_invalid() {
        let element = Arc::new(MemoryMediaElement::new());
        let player = controller(&element, StaticProbe::none());

        assert!(matches!(player.play().await, Err(Error::InvalidState(_))));
        assert!(matches!(player.pause(), Err(Error::InvalidState(_))));
        assert!(matches!(player.seek_to(3.0).await, Err(Error::InvalidState(_))));
        assert_eq!(player.buffer(), BufferInfo::EMPTY);
    }

    #[tokio::test]
    async fn test_dash_events_drive_state() {
        let element = Arc::new(MemoryMediaElement::new());
        let engine = Arc::new(MemoryDashEngine::new());
        engine.set_buffer_length(7.5);
        let mut player = PlaybackController::with_probe(
            element.clone(),
            EngineProviders::new().with_dash(MemoryDashEngine::provider(&engine)),
            PlayerConfig::default(),
            Arc::new(StaticProbe::failing("offline")),
        )
        .unwrap();

        player.load("https://cdn.example.com/live.mpd").await.unwrap();
        assert_eq!(player.source_type(), Some(SourceType::Dash));
        assert!(!engine.is_paused());

        engine.dispatch(DashEvent::ManifestLoadingStarted);
        assert_eq!(player.state(), PlaybackState::Loading);
        engine.dispatch(DashEvent::PlaybackTimeUpdated);
        assert_eq!(player.state(), PlaybackState::Loading);
        assert_eq!(player.buffer_health(), Some(BufferInfo::new(7.5)));

        engine.dispatch_error(&EngineError::new("download", "fragment timeout", false));
        assert_eq!(player.state(), PlaybackState::Loading);

        player.destroy();
        assert!(engine.is_destroyed());
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(player.buffer_health(), None);
    }
}
