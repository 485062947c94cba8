use std::path::PathBuf;

use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::tasks::{ComputeTaskPool, TaskPoolBuilder};
use cavern::resources::LevelSource;
use cavern::settings::Settings;
use micromegas_telemetry_sink::TelemetryGuardBuilder;
use micromegas_telemetry_sink::tracing_interop::TracingCaptureLayer;
use micromegas_tracing::dispatch::{flush_thread_buffer, init_thread_stream, unregister_thread_stream};
use micromegas_tracing::levels::LevelFilter;
use micromegas_tracing::prelude::{info, warn};
use tracing_subscriber::Registry;
use tracing_subscriber::layer::SubscriberExt;

const DEFAULT_SETTINGS: &str = "assets/config/default_settings.json";

fn main() {
    // 1. Initialize telemetry (creates LocalEventSink for stdout).
    //    Spans require MICROMEGAS_ENABLE_CPU_TRACING=true; logs and metrics
    //    always work.
    let _telemetry_guard = TelemetryGuardBuilder::default()
        .with_install_tracing_capture(false)
        .build()
        .expect("failed to initialize telemetry");

    // 2. Route Bevy's own `tracing` output into Micromegas. Must be set
    //    before Bevy starts.
    let subscriber = Registry::default().with(TracingCaptureLayer {
        max_level: LevelFilter::Info,
    });
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    // Usage: cavern [LEVEL_FILE] [SETTINGS_FILE]
    let mut args = std::env::args().skip(1);
    let level = args.next().map(PathBuf::from).map(LevelSource).unwrap_or_default();
    let settings_path = args.next().unwrap_or_else(|| DEFAULT_SETTINGS.to_string());

    let settings = match Settings::load(&settings_path) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("{e}; using default settings");
            Settings::default()
        }
    };
    info!("cavern starting: level {}", level.0.display());

    // 3. Pre-init ComputeTaskPool with Micromegas thread callbacks, before
    //    App::new() so TaskPoolPlugin keeps it.
    ComputeTaskPool::get_or_init(|| {
        TaskPoolBuilder::new()
            .on_thread_spawn(|| {
                init_thread_stream();
            })
            .on_thread_destroy(|| {
                flush_thread_buffer();
                unregister_thread_stream();
            })
            .build()
    });

    // 4. Run Bevy app
    let mut app = App::new();
    app.add_plugins(DefaultPlugins.build().disable::<LogPlugin>());
    app.insert_resource(level);
    settings.insert_into(&mut app);
    app.add_plugins(cavern::CavernPlugin);
    app.run();
}
