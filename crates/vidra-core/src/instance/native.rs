//! Native backend: the presentation element plays the source itself

use super::scope::ListenerScope;
use super::{attach_element_listener, emit_state};
use crate::element::{MediaElement, MediaError, MediaEvent, TimeRange};
use crate::emitter::{EventEmitter, PlaybackEvent};
use crate::types::{BufferInfo, ErrorMetadata, PlaybackState};
use parking_lot::Mutex;
use std::sync::Arc;

/// Element events that map one-to-one onto a playback state
const NATIVE_EVENTS: [(MediaEvent, PlaybackState); 7] = [
    (MediaEvent::LoadStart, PlaybackState::Loading),
    (MediaEvent::CanPlay, PlaybackState::Ready),
    (MediaEvent::Playing, PlaybackState::Playing),
    (MediaEvent::Pause, PlaybackState::Paused),
    (MediaEvent::Seeking, PlaybackState::Seeking),
    (MediaEvent::Waiting, PlaybackState::Buffering),
    (MediaEvent::Ended, PlaybackState::Ended),
];

/// Length of the buffered range containing the playhead.
///
/// A playhead that falls into a gap between ranges, or outside all of them,
/// reports [`BufferInfo::EMPTY`]. The scan is bounded by the number of ranges.
pub fn buffer_at(ranges: &[TimeRange], current_time: f64) -> BufferInfo {
    ranges
        .iter()
        .find(|range| range.contains(current_time))
        .map_or(BufferInfo::EMPTY, |range| BufferInfo::new(range.length()))
}

pub(crate) struct NativeBackend {
    buffer: Arc<Mutex<BufferInfo>>,
    pub(super) listeners: Option<ListenerScope>,
}

impl NativeBackend {
    pub(crate) fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(BufferInfo::EMPTY)),
            listeners: None,
        }
    }

    /// Sample slot refreshed on every `timeupdate`
    pub(crate) fn buffer_slot(&self) -> Arc<Mutex<BufferInfo>> {
        self.buffer.clone()
    }

    pub(crate) fn buffer(&self) -> BufferInfo {
        *self.buffer.lock()
    }

    pub(crate) fn register(&mut self, element: &Arc<dyn MediaElement>, emitter: &Arc<EventEmitter>) {
        let mut scope = ListenerScope::new();

        for (event, state) in NATIVE_EVENTS {
            let listener = scope.guard(emit_state(emitter, state));
            attach_element_listener(&mut scope, element, event, listener);
        }

        let weak = Arc::downgrade(element);
        let buffer = self.buffer.clone();
        let on_time_update = emitter.clone();
        let listener = scope.guard(move || {
            if let Some(element) = weak.upgrade() {
                *buffer.lock() = buffer_at(&element.buffered(), element.current_time());
            }
            on_time_update.emit(PlaybackEvent::state(PlaybackState::TimeUpdated));
        });
        attach_element_listener(&mut scope, element, MediaEvent::TimeUpdate, listener);

        let weak = Arc::downgrade(element);
        let on_error = emitter.clone();
        let listener = scope.guard(move || {
            let Some(element) = weak.upgrade() else {
                return;
            };
            let error = element.error().unwrap_or_else(|| MediaError::new(0, ""));
            on_error.emit(PlaybackEvent::Error(ErrorMetadata::from(&error)));
        });
        attach_element_listener(&mut scope, element, MediaEvent::Error, listener);

        self.listeners = Some(scope);
    }

    pub(crate) fn load(&self, element: &Arc<dyn MediaElement>, src: &str) {
        element.set_src(src);
    }

    pub(crate) fn teardown(&mut self, element: Option<&Arc<dyn MediaElement>>) {
        if let Some(element) = element {
            element.set_src("");
            element.load();
        }
        *self.buffer.lock() = BufferInfo::EMPTY;
    }
}
