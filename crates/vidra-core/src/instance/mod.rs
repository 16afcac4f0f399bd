//! Playback instances
//!
//! A [`PlaybackInstance`] drives exactly one playback technology:
//!
//! | Backend | Transport controls | Events |
//! |---------|--------------------|--------|
//! | Native  | presentation element | presentation element |
//! | DASH    | [`DashEngine`](crate::DashEngine) | engine |
//! | HLS     | presentation element | engine + presentation element |
//!
//! All three translate their native event vocabulary into
//! [`PlaybackEvent`]s on the instance's own [`EventEmitter`].

mod dash;
mod hls;
mod native;
mod scope;

pub use native::buffer_at;

use crate::element::{Listener, MediaElement, MediaEvent};
use crate::emitter::{EventEmitter, EventKind, HandlerId, PlaybackEvent};
use crate::engine::{DashEngine, DashProvider, HlsEngine, HlsProvider};
use crate::types::{BufferInfo, InstanceId, PlaybackState, SourceType, TrackType};
use crate::{Error, Result};
use dash::DashBackend;
use hls::HlsBackend;
use native::NativeBackend;
use parking_lot::Mutex;
use scope::ListenerScope;
use std::sync::Arc;
use tracing::debug;

/// Concrete playback technology behind an instance
pub(crate) enum Backend {
    Native(NativeBackend),
    Dash(DashBackend),
    Hls(HlsBackend),
}

impl Backend {
    fn listeners_mut(&mut self) -> &mut Option<ListenerScope> {
        match self {
            Backend::Native(native) => &mut native.listeners,
            Backend::Dash(dash) => &mut dash.listeners,
            Backend::Hls(hls) => &mut hls.listeners,
        }
    }

    fn listeners(&self) -> Option<&ListenerScope> {
        match self {
            Backend::Native(native) => native.listeners.as_ref(),
            Backend::Dash(dash) => dash.listeners.as_ref(),
            Backend::Hls(hls) => hls.listeners.as_ref(),
        }
    }
}

/// Where the current buffer length can be read from, detached from the
/// instance so event handlers can sample it without borrowing the instance
#[derive(Clone)]
pub(crate) enum BufferSource {
    Sampled(Arc<Mutex<BufferInfo>>),
    Dash(Arc<dyn DashEngine>, TrackType),
    Hls(Arc<dyn HlsEngine>),
    Unavailable,
}

impl BufferSource {
    pub(crate) fn read(&self) -> BufferInfo {
        match self {
            BufferSource::Sampled(slot) => *slot.lock(),
            BufferSource::Dash(tech, track) => BufferInfo::new(tech.buffer_length(*track)),
            BufferSource::Hls(tech) => BufferInfo::new(tech.buffer_length()),
            BufferSource::Unavailable => BufferInfo::EMPTY,
        }
    }
}

/// One playback attempt on one backend
pub struct PlaybackInstance {
    id: InstanceId,
    backend: Backend,
    media: Option<Arc<dyn MediaElement>>,
    emitter: Arc<EventEmitter>,
    destroyed: bool,
}

impl PlaybackInstance {
    pub(crate) fn native() -> Self {
        Self::with_backend(Backend::Native(NativeBackend::new()))
    }

    pub(crate) fn dash(provider: Option<DashProvider>, track: TrackType) -> Self {
        Self::with_backend(Backend::Dash(DashBackend::new(provider, track)))
    }

    pub(crate) fn hls(provider: Option<HlsProvider>) -> Self {
        Self::with_backend(Backend::Hls(HlsBackend::new(provider)))
    }

    fn with_backend(backend: Backend) -> Self {
        Self {
            id: InstanceId::new(),
            backend,
            media: None,
            emitter: Arc::new(EventEmitter::new()),
            destroyed: false,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn source_type(&self) -> SourceType {
        match self.backend {
            Backend::Native(_) => SourceType::Native,
            Backend::Dash(_) => SourceType::Dash,
            Backend::Hls(_) => SourceType::Hls,
        }
    }

    pub fn emitter(&self) -> &Arc<EventEmitter> {
        &self.emitter
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&PlaybackEvent) + Send + Sync + 'static,
    {
        self.emitter.on(kind, handler)
    }

    pub fn off(&self, kind: EventKind, id: Option<HandlerId>) {
        self.emitter.off(kind, id)
    }

    pub fn media(&self) -> Option<&Arc<dyn MediaElement>> {
        self.media.as_ref()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Whether backend events are currently wired to the emitter
    pub fn has_listeners(&self) -> bool {
        self.backend.listeners().is_some()
    }

    /// Bind the presentation element without starting playback
    pub fn attach_media(&mut self, element: Arc<dyn MediaElement>) -> Result<()> {
        self.ensure_live()?;
        self.media = Some(element);
        if let Backend::Native(_) = self.backend {
            self.register_listeners()?;
        }
        Ok(())
    }

    /// Release the element reference and every listener that depends on it.
    ///
    /// DASH engine listeners stay wired until `destroy`. Safe to call
    /// repeatedly.
    pub fn detach_media(&mut self) {
        if matches!(self.backend, Backend::Native(_) | Backend::Hls(_)) {
            self.unregister_listeners();
        }
        if let Backend::Hls(hls) = &self.backend {
            hls.detach();
        }
        self.media = None;
    }

    /// Acquire the backend technology handle
    pub fn init(&mut self) -> Result<()> {
        self.ensure_live()?;
        match &mut self.backend {
            Backend::Native(_) => Ok(()),
            Backend::Dash(dash) => dash.init(),
            Backend::Hls(hls) => hls.init(),
        }?;
        debug!(instance_id = %self.id, source_type = %self.source_type(), "Backend initialized");
        Ok(())
    }

    /// Hand `src` to the backend
    pub fn load(&mut self, src: &str) -> Result<()> {
        self.ensure_live()?;
        let media = self.require_media()?;
        let emitter = self.emitter.clone();
        match &mut self.backend {
            Backend::Native(native) => {
                native.load(&media, src);
                Ok(())
            }
            Backend::Dash(dash) => dash.load(&media, src, &emitter),
            Backend::Hls(hls) => hls.load(&media, src, &emitter),
        }?;
        debug!(instance_id = %self.id, src = src, "Source loaded");
        Ok(())
    }

    /// Resolves once playback has started
    pub async fn play(&self) -> Result<()> {
        self.ensure_live()?;
        match &self.backend {
            Backend::Dash(dash) => {
                let tech = dash.tech()?;
                tech.play().await
            }
            Backend::Native(_) | Backend::Hls(_) => {
                let media = self.require_media()?;
                media.play().await
            }
        }
    }

    pub fn pause(&self) -> Result<()> {
        self.ensure_live()?;
        match &self.backend {
            Backend::Dash(dash) => dash.tech()?.pause(),
            Backend::Native(_) | Backend::Hls(_) => self.require_media()?.pause(),
        }
        Ok(())
    }

    /// Seeking is not supported by any backend yet
    pub async fn seek_to(&self, _position: f64) -> Result<()> {
        Err(Error::NotImplemented("seek_to"))
    }

    /// Buffer health at the playhead
    pub fn buffer(&self) -> BufferInfo {
        match &self.backend {
            Backend::Native(native) => native.buffer(),
            Backend::Dash(dash) => dash.buffer(),
            Backend::Hls(hls) => hls.buffer(),
        }
    }

    pub(crate) fn buffer_source(&self) -> BufferSource {
        match &self.backend {
            Backend::Native(native) => BufferSource::Sampled(native.buffer_slot()),
            Backend::Dash(dash) => match dash.tech() {
                Ok(tech) => BufferSource::Dash(tech, dash.track()),
                Err(_) => BufferSource::Unavailable,
            },
            Backend::Hls(hls) => match hls.tech() {
                Ok(tech) => BufferSource::Hls(tech),
                Err(_) => BufferSource::Unavailable,
            },
        }
    }

    /// Tear down listeners, the backend and the element binding.
    ///
    /// Subsequent calls are no-ops.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.unregister_listeners();
        match &mut self.backend {
            Backend::Native(native) => native.teardown(self.media.as_ref()),
            Backend::Dash(dash) => dash.teardown(),
            Backend::Hls(hls) => hls.teardown(),
        }
        self.detach_media();
        self.destroyed = true;
        debug!(instance_id = %self.id, source_type = %self.source_type(), "Instance destroyed");
    }

    /// Wire backend events to the emitter with a fresh listener scope
    pub(crate) fn register_listeners(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.unregister_listeners();
        let emitter = self.emitter.clone();
        match &mut self.backend {
            Backend::Native(native) => {
                let media = self
                    .media
                    .clone()
                    .ok_or_else(|| Error::invalid_state("media element is not attached"))?;
                native.register(&media, &emitter);
                Ok(())
            }
            Backend::Dash(dash) => dash.register(&emitter),
            Backend::Hls(hls) => {
                let media = self
                    .media
                    .clone()
                    .ok_or_else(|| Error::invalid_state("media element is not attached"))?;
                hls.register(&media, &emitter)
            }
        }?;
        if let Some(scope) = self.backend.listeners() {
            debug!(instance_id = %self.id, listeners = scope.len(), "Listeners registered");
        }
        Ok(())
    }

    /// Detach every listener of the current scope; no-op when none is active
    pub(crate) fn unregister_listeners(&mut self) {
        if let Some(scope) = self.backend.listeners_mut().take() {
            debug!(instance_id = %self.id, listeners = scope.len(), "Listeners unregistered");
            scope.release();
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.destroyed {
            return Err(Error::invalid_state("playback instance was destroyed"));
        }
        Ok(())
    }

    fn require_media(&self) -> Result<Arc<dyn MediaElement>> {
        self.media
            .clone()
            .ok_or_else(|| Error::invalid_state("media element is not attached"))
    }
}

impl Drop for PlaybackInstance {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for PlaybackInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackInstance")
            .field("id", &self.id)
            .field("source_type", &self.source_type())
            .field("media_attached", &self.media.is_some())
            .field("listeners", &self.has_listeners())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

pub(crate) fn emit_state(
    emitter: &Arc<EventEmitter>,
    state: PlaybackState,
) -> impl Fn() + Send + Sync + 'static {
    let emitter = emitter.clone();
    move || emitter.emit(PlaybackEvent::state(state))
}

/// Attach `listener` and record its removal in `scope`
pub(crate) fn attach_element_listener(
    scope: &mut ListenerScope,
    element: &Arc<dyn MediaElement>,
    event: MediaEvent,
    listener: Listener,
) {
    let id = element.add_event_listener(event, listener);
    let element = Arc::downgrade(element);
    scope.on_release(move || {
        if let Some(element) = element.upgrade() {
            element.remove_event_listener(event, id);
        }
    });
}
