//! Playback event emission
//!
//! Every playback instance owns an [`EventEmitter`] through which it
//! publishes normalized events. The controller subscribes to it and
//! re-publishes on its own emitter for host-side listeners.

use crate::types::{ErrorMetadata, PlaybackState};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Normalized playback events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PlaybackEvent {
    /// Backend reported a state change
    PlaybackState { state: PlaybackState },
    /// Backend reported a runtime error
    Error(ErrorMetadata),
}

impl PlaybackEvent {
    pub fn state(state: PlaybackState) -> Self {
        PlaybackEvent::PlaybackState { state }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            PlaybackEvent::PlaybackState { .. } => EventKind::PlaybackState,
            PlaybackEvent::Error(_) => EventKind::Error,
        }
    }
}

/// Event names handlers subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PlaybackState,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PlaybackState => "playbackState",
            EventKind::Error => "error",
        }
    }
}

/// Subscription handle returned by [`EventEmitter::on`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

pub type Handler = Arc<dyn Fn(&PlaybackEvent) + Send + Sync>;

/// Synchronous publish/subscribe channel keyed by [`EventKind`]
#[derive(Default)]
pub struct EventEmitter {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<EventKind, Vec<(HandlerId, Handler)>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one event kind; handlers run in subscription order
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&PlaybackEvent) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove one handler, or every handler of `kind` when `id` is `None`
    pub fn off(&self, kind: EventKind, id: Option<HandlerId>) {
        let mut handlers = self.handlers.lock();
        match id {
            Some(id) => {
                if let Some(list) = handlers.get_mut(&kind) {
                    list.retain(|(handler_id, _)| *handler_id != id);
                }
            }
            None => {
                handlers.remove(&kind);
            }
        }
    }

    /// Dispatch to the handlers subscribed at the time of the call.
    ///
    /// The lock is released before any handler runs, so handlers may
    /// subscribe, unsubscribe or emit from inside the callback.
    pub fn emit(&self, event: PlaybackEvent) {
        let snapshot: Vec<Handler> = match self.handlers.lock().get(&event.kind()) {
            Some(list) => list.iter().map(|(_, handler)| handler.clone()).collect(),
            None => return,
        };

        for handler in snapshot {
            handler(&event);
        }
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.lock().get(&kind).map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        self.handlers.lock().clear();
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("playback_state_handlers", &self.handler_count(EventKind::PlaybackState))
            .field("error_handlers", &self.handler_count(EventKind::Error))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorPayload;

    fn recorder(emitter: &EventEmitter, kind: EventKind, tag: &'static str, log: &Arc<Mutex<Vec<String>>>) -> HandlerId {
        let log = log.clone();
        emitter.on(kind, move |event| {
            let entry = match event {
                PlaybackEvent::PlaybackState { state } => format!("{}:{}", tag, state),
                PlaybackEvent::Error(meta) => format!("{}:{}", tag, meta.error_type),
            };
            log.lock().push(entry);
        })
    }

    #[test]
    fn test_handlers_fire_in_subscription_order() {
        let emitter = EventEmitter::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&emitter, EventKind::PlaybackState, "a", &log);
        recorder(&emitter, EventKind::PlaybackState, "b", &log);

        emitter.emit(PlaybackEvent::state(PlaybackState::Loading));
        emitter.emit(PlaybackEvent::state(PlaybackState::Ready));

        assert_eq!(
            *log.lock(),
            vec!["a:loading", "b:loading", "a:ready", "b:ready"]
        );
    }

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let emitter = EventEmitter::new();
        emitter.emit(PlaybackEvent::state(PlaybackState::Playing));
        assert_eq!(emitter.handler_count(EventKind::PlaybackState), 0);
    }

    #[test]
    fn test_off_single_and_all() {
        let emitter = EventEmitter::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = recorder(&emitter, EventKind::PlaybackState, "a", &log);
        recorder(&emitter, EventKind::PlaybackState, "b", &log);
        recorder(&emitter, EventKind::Error, "e", &log);

        emitter.off(EventKind::PlaybackState, Some(first));
        emitter.emit(PlaybackEvent::state(PlaybackState::Paused));
        assert_eq!(*log.lock(), vec!["b:paused"]);

        emitter.off(EventKind::PlaybackState, None);
        assert_eq!(emitter.handler_count(EventKind::PlaybackState), 0);
        assert_eq!(emitter.handler_count(EventKind::Error), 1);
    }

    #[test]
    fn test_kinds_are_isolated() {
        let emitter = EventEmitter::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        recorder(&emitter, EventKind::Error, "e", &log);

        emitter.emit(PlaybackEvent::state(PlaybackState::Ended));
        emitter.emit(PlaybackEvent::Error(ErrorMetadata {
            error_type: "DECODE".into(),
            details: String::new(),
            fatal: true,
            payload: ErrorPayload::Native { code: 3 },
        }));

        assert_eq!(*log.lock(), vec!["e:DECODE"]);
    }

    #[test]
    fn test_reentrant_emit_does_not_deadlock() {
        let emitter = Arc::new(EventEmitter::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner = emitter.clone();
        emitter.on(EventKind::PlaybackState, move |event| {
            if let PlaybackEvent::PlaybackState { state: PlaybackState::Loading } = event {
                inner.emit(PlaybackEvent::state(PlaybackState::Ready));
            }
        });
        recorder(&emitter, EventKind::PlaybackState, "r", &log);

        emitter.emit(PlaybackEvent::state(PlaybackState::Loading));

        assert_eq!(*log.lock(), vec!["r:ready", "r:loading"]);
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(PlaybackEvent::state(PlaybackState::Buffering)).unwrap();
        assert_eq!(json["event"], "playbackState");
        assert_eq!(json["state"], "BUFFERING");
        assert_eq!(EventKind::Error.as_str(), "error");

        let json = serde_json::to_value(PlaybackEvent::Error(ErrorMetadata {
            error_type: "NETWORK".into(),
            details: "connection reset".into(),
            fatal: true,
            payload: ErrorPayload::Native { code: 2 },
        }))
        .unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["type"], "NETWORK");
        assert_eq!(json["code"], 2);
    }
}
