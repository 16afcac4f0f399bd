//! In-memory presentation element and streaming engines
//!
//! Headless hosts (and the test suite) use these to drive playback without a
//! rendering surface: every backend event is fired explicitly with
//! `dispatch`, and every side effect the core performs is observable.

use crate::element::{Listener, ListenerId, MediaElement, MediaError, MediaEvent, TimeRange};
use crate::detect::SourceProbe;
use crate::engine::{DashEngine, DashEvent, EngineError, ErrorListener, HlsEngine, HlsEvent};
use crate::types::TrackType;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Listener table keyed by event name
struct Registry<K, L> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(K, ListenerId, L)>>,
}

impl<K: Copy + PartialEq, L: Clone> Registry<K, L> {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    fn add(&self, key: K, listener: L) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.lock().push((key, id, listener));
        id
    }

    fn remove(&self, id: ListenerId) {
        self.entries.lock().retain(|(_, entry_id, _)| *entry_id != id);
    }

    /// Copy out matching listeners so none run while the table is locked
    fn matching(&self, key: K) -> Vec<L> {
        self.entries
            .lock()
            .iter()
            .filter(|(entry_key, _, _)| *entry_key == key)
            .map(|(_, _, listener)| listener.clone())
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn count(&self, key: K) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|(entry_key, _, _)| *entry_key == key)
            .count()
    }

    fn clear(&self) {
        self.entries.lock().clear();
    }
}

fn autoplay_rejection() -> Error {
    Error::PlaybackRejected("play() request was blocked by the autoplay policy".into())
}

#[derive(Debug)]
struct ElementState {
    src: String,
    paused: bool,
    current_time: f64,
    buffered: Vec<TimeRange>,
    error: Option<MediaError>,
}

/// A presentation element with no rendering surface
pub struct MemoryMediaElement {
    state: Mutex<ElementState>,
    listeners: Registry<MediaEvent, Listener>,
    autoplay_blocked: AtomicBool,
    load_calls: AtomicUsize,
}

impl MemoryMediaElement {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ElementState {
                src: String::new(),
                paused: true,
                current_time: 0.0,
                buffered: Vec::new(),
                error: None,
            }),
            listeners: Registry::new(),
            autoplay_blocked: AtomicBool::new(false),
            load_calls: AtomicUsize::new(0),
        }
    }

    /// Fire `event` at every listener currently attached for it
    pub fn dispatch(&self, event: MediaEvent) {
        for listener in self.listeners.matching(event) {
            listener();
        }
    }

    /// Listeners currently attached for `event`
    pub fn listeners_for(&self, event: MediaEvent) -> Vec<Listener> {
        self.listeners.matching(event)
    }

    pub fn listener_count(&self, event: MediaEvent) -> usize {
        self.listeners.count(event)
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners.len()
    }

    pub fn set_current_time(&self, time: f64) {
        self.state.lock().current_time = time;
    }

    pub fn set_buffered(&self, ranges: Vec<TimeRange>) {
        self.state.lock().buffered = ranges;
    }

    pub fn set_error(&self, error: Option<MediaError>) {
        self.state.lock().error = error;
    }

    /// Make `play()` fail the way a browser autoplay policy does
    pub fn block_autoplay(&self, blocked: bool) {
        self.autoplay_blocked.store(blocked, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Number of `load()` calls so far
    pub fn load_count(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }
}

impl Default for MemoryMediaElement {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaElement for MemoryMediaElement {
    fn src(&self) -> String {
        self.state.lock().src.clone()
    }

    fn set_src(&self, src: &str) {
        self.state.lock().src = src.to_string();
    }

    async fn play(&self) -> Result<()> {
        if self.autoplay_blocked.load(Ordering::SeqCst) {
            return Err(autoplay_rejection());
        }
        self.state.lock().paused = false;
        Ok(())
    }

    fn pause(&self) {
        self.state.lock().paused = true;
    }

    fn load(&self) {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.paused = true;
        state.current_time = 0.0;
        state.buffered.clear();
        state.error = None;
    }

    fn buffered(&self) -> Vec<TimeRange> {
        self.state.lock().buffered.clone()
    }

    fn current_time(&self) -> f64 {
        self.state.lock().current_time
    }

    fn error(&self) -> Option<MediaError> {
        self.state.lock().error.clone()
    }

    fn add_event_listener(&self, event: MediaEvent, listener: Listener) -> ListenerId {
        self.listeners.add(event, listener)
    }

    fn remove_event_listener(&self, _event: MediaEvent, id: ListenerId) {
        self.listeners.remove(id);
    }
}

/// A DASH engine that records what the core asks of it
pub struct MemoryDashEngine {
    url: Mutex<Option<String>>,
    paused: AtomicBool,
    destroyed: AtomicBool,
    autoplay_blocked: AtomicBool,
    buffer_length: Mutex<f64>,
    listeners: Registry<DashEvent, Listener>,
    error_listeners: Registry<(), ErrorListener>,
}

impl MemoryDashEngine {
    pub fn new() -> Self {
        Self {
            url: Mutex::new(None),
            paused: AtomicBool::new(true),
            destroyed: AtomicBool::new(false),
            autoplay_blocked: AtomicBool::new(false),
            buffer_length: Mutex::new(0.0),
            listeners: Registry::new(),
            error_listeners: Registry::new(),
        }
    }

    /// Provider handing out this engine, for [`EngineProviders::with_dash`](crate::EngineProviders::with_dash)
    pub fn provider(engine: &Arc<Self>) -> impl Fn() -> Option<Arc<dyn DashEngine>> + Send + Sync + 'static {
        let engine = engine.clone();
        move || Some(engine.clone() as Arc<dyn DashEngine>)
    }

    pub fn dispatch(&self, event: DashEvent) {
        for listener in self.listeners.matching(event) {
            listener();
        }
    }

    pub fn dispatch_error(&self, error: &EngineError) {
        for listener in self.error_listeners.matching(()) {
            listener(error);
        }
    }

    pub fn set_buffer_length(&self, seconds: f64) {
        *self.buffer_length.lock() = seconds;
    }

    pub fn block_autoplay(&self, blocked: bool) {
        self.autoplay_blocked.store(blocked, Ordering::SeqCst);
    }

    /// URL passed to `initialize`, if any
    pub fn initialized_url(&self) -> Option<String> {
        self.url.lock().clone()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Event and error listeners currently attached
    pub fn listener_count(&self) -> usize {
        self.listeners.len() + self.error_listeners.len()
    }
}

impl Default for MemoryDashEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DashEngine for MemoryDashEngine {
    fn initialize(&self, _element: Arc<dyn MediaElement>, url: &str) {
        *self.url.lock() = Some(url.to_string());
    }

    async fn play(&self) -> Result<()> {
        if self.autoplay_blocked.load(Ordering::SeqCst) {
            return Err(autoplay_rejection());
        }
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        *self.url.lock() = None;
        self.listeners.clear();
        self.error_listeners.clear();
    }

    fn buffer_length(&self, _track: TrackType) -> f64 {
        *self.buffer_length.lock()
    }

    fn on(&self, event: DashEvent, listener: Listener) -> ListenerId {
        self.listeners.add(event, listener)
    }

    fn on_error(&self, listener: ErrorListener) -> ListenerId {
        self.error_listeners.add((), listener)
    }

    fn off(&self, id: ListenerId) {
        self.listeners.remove(id);
        self.error_listeners.remove(id);
    }
}

/// An HLS engine that records what the core asks of it
pub struct MemoryHlsEngine {
    source: Mutex<Option<String>>,
    media: Mutex<Option<Arc<dyn MediaElement>>>,
    load_stopped: AtomicBool,
    destroyed: AtomicBool,
    buffer_length: Mutex<f64>,
    listeners: Registry<HlsEvent, Listener>,
    error_listeners: Registry<(), ErrorListener>,
}

impl MemoryHlsEngine {
    pub fn new() -> Self {
        Self {
            source: Mutex::new(None),
            media: Mutex::new(None),
            load_stopped: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            buffer_length: Mutex::new(0.0),
            listeners: Registry::new(),
            error_listeners: Registry::new(),
        }
    }

    /// Provider handing out this engine, for [`EngineProviders::with_hls`](crate::EngineProviders::with_hls)
    pub fn provider(engine: &Arc<Self>) -> impl Fn() -> Option<Arc<dyn HlsEngine>> + Send + Sync + 'static {
        let engine = engine.clone();
        move || Some(engine.clone() as Arc<dyn HlsEngine>)
    }

    pub fn dispatch(&self, event: HlsEvent) {
        for listener in self.listeners.matching(event) {
            listener();
        }
    }

    pub fn dispatch_error(&self, error: &EngineError) {
        for listener in self.error_listeners.matching(()) {
            listener(error);
        }
    }

    pub fn set_buffer_length(&self, seconds: f64) {
        *self.buffer_length.lock() = seconds;
    }

    /// URL passed to `load_source`, if any
    pub fn source(&self) -> Option<String> {
        self.source.lock().clone()
    }

    pub fn is_attached(&self) -> bool {
        self.media.lock().is_some()
    }

    pub fn is_load_stopped(&self) -> bool {
        self.load_stopped.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Event and error listeners currently attached
    pub fn listener_count(&self) -> usize {
        self.listeners.len() + self.error_listeners.len()
    }
}

impl Default for MemoryHlsEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HlsEngine for MemoryHlsEngine {
    fn load_source(&self, url: &str) {
        *self.source.lock() = Some(url.to_string());
        self.load_stopped.store(false, Ordering::SeqCst);
    }

    fn attach_media(&self, element: Arc<dyn MediaElement>) {
        *self.media.lock() = Some(element);
    }

    fn detach_media(&self) {
        *self.media.lock() = None;
    }

    fn stop_load(&self) {
        self.load_stopped.store(true, Ordering::SeqCst);
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
        *self.media.lock() = None;
        self.listeners.clear();
        self.error_listeners.clear();
    }

    fn buffer_length(&self) -> f64 {
        *self.buffer_length.lock()
    }

    fn on(&self, event: HlsEvent, listener: Listener) -> ListenerId {
        self.listeners.add(event, listener)
    }

    fn on_error(&self, listener: ErrorListener) -> ListenerId {
        self.error_listeners.add((), listener)
    }

    fn off(&self, id: ListenerId) {
        self.listeners.remove(id);
        self.error_listeners.remove(id);
    }
}

/// Canned answer for [`SourceProbe`]
#[derive(Debug, Clone)]
enum ProbeAnswer {
    ContentType(String),
    Missing,
    Failure(String),
}

/// A probe that always gives the same answer and counts how often it was asked
#[derive(Debug)]
pub struct StaticProbe {
    answer: ProbeAnswer,
    calls: AtomicUsize,
}

impl StaticProbe {
    fn with_answer(answer: ProbeAnswer) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
        }
    }

    /// Responds with `content_type`
    pub fn content_type(content_type: impl Into<String>) -> Self {
        Self::with_answer(ProbeAnswer::ContentType(content_type.into()))
    }

    /// Responds without a `Content-Type` header
    pub fn none() -> Self {
        Self::with_answer(ProbeAnswer::Missing)
    }

    /// Fails every request
    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with_answer(ProbeAnswer::Failure(reason.into()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceProbe for StaticProbe {
    async fn content_type(&self, _url: &str) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            ProbeAnswer::ContentType(content_type) => Ok(Some(content_type.clone())),
            ProbeAnswer::Missing => Ok(None),
            ProbeAnswer::Failure(reason) => Err(Error::Probe(reason.clone())),
        }
    }
}
