//! DASH backend driven by an injected [`DashEngine`]

use super::emit_state;
use super::scope::ListenerScope;
use crate::element::MediaElement;
use crate::emitter::{EventEmitter, PlaybackEvent};
use crate::engine::{DashEngine, DashEvent, DashProvider};
use crate::types::{BufferInfo, ErrorMetadata, PlaybackState, TrackType};
use crate::{Error, Result};
use std::sync::Arc;

const DASH_EVENTS: [(DashEvent, PlaybackState); 8] = [
    (DashEvent::ManifestLoadingStarted, PlaybackState::Loading),
    (DashEvent::CanPlay, PlaybackState::Ready),
    (DashEvent::PlaybackPlaying, PlaybackState::Playing),
    (DashEvent::PlaybackPaused, PlaybackState::Paused),
    (DashEvent::PlaybackSeeking, PlaybackState::Seeking),
    (DashEvent::FragmentLoadingStarted, PlaybackState::Buffering),
    (DashEvent::PlaybackEnded, PlaybackState::Ended),
    (DashEvent::PlaybackTimeUpdated, PlaybackState::TimeUpdated),
];

pub(crate) struct DashBackend {
    provider: Option<DashProvider>,
    track: TrackType,
    tech: Option<Arc<dyn DashEngine>>,
    pub(super) listeners: Option<ListenerScope>,
}

impl DashBackend {
    pub(crate) fn new(provider: Option<DashProvider>, track: TrackType) -> Self {
        Self {
            provider,
            track,
            tech: None,
            listeners: None,
        }
    }

    pub(crate) fn init(&mut self) -> Result<()> {
        if self.tech.is_some() {
            return Ok(());
        }
        let tech = self
            .provider
            .as_ref()
            .and_then(|provider| provider())
            .ok_or(Error::BackendUnavailable { backend: "dash" })?;
        self.tech = Some(tech);
        Ok(())
    }

    pub(crate) fn tech(&self) -> Result<Arc<dyn DashEngine>> {
        self.tech
            .clone()
            .ok_or_else(|| Error::invalid_state("dash engine is not initialized"))
    }

    pub(crate) fn track(&self) -> TrackType {
        self.track
    }

    pub(crate) fn load(
        &mut self,
        element: &Arc<dyn MediaElement>,
        src: &str,
        emitter: &Arc<EventEmitter>,
    ) -> Result<()> {
        let tech = self.tech()?;
        tech.initialize(element.clone(), src);
        self.register(emitter)
    }

    pub(crate) fn register(&mut self, emitter: &Arc<EventEmitter>) -> Result<()> {
        let tech = self.tech()?;
        let mut scope = ListenerScope::new();

        for (event, state) in DASH_EVENTS {
            let id = tech.on(event, scope.guard(emit_state(emitter, state)));
            let tech = tech.clone();
            scope.on_release(move || tech.off(id));
        }

        let on_error = emitter.clone();
        let id = tech.on_error(scope.guard_error(move |error| {
            on_error.emit(PlaybackEvent::Error(ErrorMetadata::from(error)));
        }));
        let detach = tech.clone();
        scope.on_release(move || detach.off(id));

        self.listeners = Some(scope);
        Ok(())
    }

    pub(crate) fn buffer(&self) -> BufferInfo {
        self.tech
            .as_ref()
            .map_or(BufferInfo::EMPTY, |tech| BufferInfo::new(tech.buffer_length(self.track)))
    }

    pub(crate) fn teardown(&mut self) {
        if let Some(tech) = self.tech.take() {
            tech.destroy();
        }
    }
}
