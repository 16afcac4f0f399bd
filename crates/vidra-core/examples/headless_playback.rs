//! Drive a playback controller without a rendering surface
//!
//! Run with: RUST_LOG=debug cargo run -p vidra-core --example headless_playback [URL]
//!
//! The in-memory element and engines stand in for a real host. Backend
//! events are fired by hand so the normalized state stream is visible.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use vidra_core::memory::{MemoryDashEngine, MemoryHlsEngine, MemoryMediaElement};
use vidra_core::{
    DashEvent, EngineProviders, EventKind, HlsEvent, MediaEvent, PlaybackController,
    PlaybackEvent, PlayerConfig, SourceType, TimeRange,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    vidra_core::init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://test-streams.mux.dev/x36xhzz/x36xhzz.m3u8".to_string());

    let element = Arc::new(MemoryMediaElement::new());
    element.set_buffered(vec![TimeRange::new(0.0, 12.0)]);
    element.set_current_time(2.0);

    let dash = Arc::new(MemoryDashEngine::new());
    dash.set_buffer_length(8.0);
    let hls = Arc::new(MemoryHlsEngine::new());
    hls.set_buffer_length(6.0);

    let providers = EngineProviders::new()
        .with_dash(MemoryDashEngine::provider(&dash))
        .with_hls(MemoryHlsEngine::provider(&hls));

    let mut player = PlaybackController::new(element.clone(), providers, PlayerConfig::default())?;

    player.on(EventKind::PlaybackState, |event| {
        println!("{}", serde_json::to_string(event).unwrap_or_default());
    });
    player.on(EventKind::Error, |event| {
        if let PlaybackEvent::Error(meta) = event {
            eprintln!("error: {} ({}), fatal={}", meta.error_type, meta.details, meta.fatal);
        }
    });

    player.load(&url).await?;
    let source_type = player.source_type().unwrap_or(SourceType::Unknown);
    println!("backend: {}", source_type);

    match source_type {
        SourceType::Dash => {
            dash.dispatch(DashEvent::ManifestLoadingStarted);
            dash.dispatch(DashEvent::CanPlay);
            dash.dispatch(DashEvent::PlaybackPlaying);
            dash.dispatch(DashEvent::PlaybackTimeUpdated);
        }
        SourceType::Hls => {
            hls.dispatch(HlsEvent::ManifestLoading);
            hls.dispatch(HlsEvent::ManifestParsed);
            element.dispatch(MediaEvent::Playing);
            element.dispatch(MediaEvent::TimeUpdate);
        }
        _ => {
            element.dispatch(MediaEvent::LoadStart);
            element.dispatch(MediaEvent::CanPlay);
            element.dispatch(MediaEvent::Playing);
            element.dispatch(MediaEvent::TimeUpdate);
        }
    }

    println!("state: {}", player.state());
    if let Some(sample) = player.buffer_health() {
        println!("buffered ahead: {:.1}s", sample.length);
    }

    player.destroy();
    println!("state: {}", player.state());
    Ok(())
}
