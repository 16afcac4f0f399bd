//! Maps a detected [`SourceType`] to a fresh [`PlaybackInstance`]

use crate::engine::EngineProviders;
use crate::instance::PlaybackInstance;
use crate::types::{PlayerConfig, SourceType, TrackType};
use crate::{Error, Result};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct InstanceFactory {
    providers: EngineProviders,
    dash_track: TrackType,
}

impl InstanceFactory {
    pub fn new(providers: EngineProviders, config: &PlayerConfig) -> Self {
        Self {
            providers,
            dash_track: config.dash_track,
        }
    }

    /// Build an uninitialized instance for `source_type`
    pub fn create(&self, source_type: SourceType) -> Result<PlaybackInstance> {
        let instance = match source_type {
            SourceType::Native => PlaybackInstance::native(),
            SourceType::Dash => PlaybackInstance::dash(self.providers.dash(), self.dash_track),
            SourceType::Hls => PlaybackInstance::hls(self.providers.hls()),
            SourceType::Unknown => return Err(Error::UnsupportedSourceType(source_type)),
        };
        debug!(instance_id = %instance.id(), source_type = %source_type, "Instance created");
        Ok(instance)
    }
}
