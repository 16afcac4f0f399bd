//! HLS backend: an injected [`HlsEngine`] feeds the element, transport
//! controls and playback events come from the element itself

use super::scope::ListenerScope;
use super::{attach_element_listener, emit_state};
use crate::element::{MediaElement, MediaEvent};
use crate::emitter::{EventEmitter, PlaybackEvent};
use crate::engine::{HlsEngine, HlsEvent, HlsProvider};
use crate::types::{BufferInfo, ErrorMetadata, PlaybackState};
use crate::{Error, Result};
use std::sync::Arc;

const HLS_ENGINE_EVENTS: [(HlsEvent, PlaybackState); 3] = [
    (HlsEvent::ManifestLoading, PlaybackState::Loading),
    (HlsEvent::ManifestParsed, PlaybackState::Ready),
    (HlsEvent::FragLoading, PlaybackState::Buffering),
];

const HLS_ELEMENT_EVENTS: [(MediaEvent, PlaybackState); 5] = [
    (MediaEvent::Playing, PlaybackState::Playing),
    (MediaEvent::Pause, PlaybackState::Paused),
    (MediaEvent::Seeking, PlaybackState::Seeking),
    (MediaEvent::Ended, PlaybackState::Ended),
    (MediaEvent::TimeUpdate, PlaybackState::TimeUpdated),
];

pub(crate) struct HlsBackend {
    provider: Option<HlsProvider>,
    tech: Option<Arc<dyn HlsEngine>>,
    pub(super) listeners: Option<ListenerScope>,
}

impl HlsBackend {
    pub(crate) fn new(provider: Option<HlsProvider>) -> Self {
        Self {
            provider,
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
            .ok_or(Error::BackendUnavailable { backend: "hls" })?;
        self.tech = Some(tech);
        Ok(())
    }

    pub(crate) fn tech(&self) -> Result<Arc<dyn HlsEngine>> {
        self.tech
            .clone()
            .ok_or_else(|| Error::invalid_state("hls engine is not initialized"))
    }

    pub(crate) fn load(
        &mut self,
        element: &Arc<dyn MediaElement>,
        src: &str,
        emitter: &Arc<EventEmitter>,
    ) -> Result<()> {
        let tech = self.tech()?;
        tech.load_source(src);
        tech.attach_media(element.clone());
        self.register(element, emitter)
    }

    pub(crate) fn register(
        &mut self,
        element: &Arc<dyn MediaElement>,
        emitter: &Arc<EventEmitter>,
    ) -> Result<()> {
        let tech = self.tech()?;
        let mut scope = ListenerScope::new();

        for (event, state) in HLS_ENGINE_EVENTS {
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

        for (event, state) in HLS_ELEMENT_EVENTS {
            let listener = scope.guard(emit_state(emitter, state));
            attach_element_listener(&mut scope, element, event, listener);
        }

        self.listeners = Some(scope);
        Ok(())
    }

    /// Unbind the engine from the element, keeping the engine itself alive
    pub(crate) fn detach(&self) {
        if let Some(tech) = &self.tech {
            tech.detach_media();
        }
    }

    pub(crate) fn buffer(&self) -> BufferInfo {
        self.tech
            .as_ref()
            .map_or(BufferInfo::EMPTY, |tech| BufferInfo::new(tech.buffer_length()))
    }

    pub(crate) fn teardown(&mut self) {
        if let Some(tech) = self.tech.take() {
            tech.stop_load();
            tech.detach_media();
            tech.destroy();
        }
    }
}
