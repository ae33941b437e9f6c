//! Bokeh Viewer - environment-lit glTF scene with a depth-of-field post-process

mod app;
pub mod camera;
pub mod config;
pub mod context;
pub mod environment;
pub mod frame;
pub mod material;
pub mod model;
pub mod params;
pub mod postfx;
mod renderer;
pub mod scene;
mod viewport;
pub mod worker;

pub use config::ViewerConfig;

use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Run the viewer. `asset_dir` overrides the configured asset root;
/// `default_filter` applies when `RUST_LOG` is unset.
pub fn run(asset_dir: Option<PathBuf>, default_filter: &str) -> Result<()> {
    // Logger for `log` records from wgpu / eframe
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).try_init();

    let trace_guard = init_tracing(default_filter);

    // Friendly panic handler for GPU errors
    std::panic::set_hook(Box::new(|info| {
        let msg = info
            .payload()
            .downcast_ref::<String>()
            .map(|s| s.as_str())
            .or_else(|| info.payload().downcast_ref::<&str>().copied())
            .unwrap_or("Unknown error");

        if msg.contains("wgpu") || msg.contains("shader") {
            eprintln!("\n[GPU Error] {}", msg);
            eprintln!("\nThe GPU rejected a pipeline or resource. Check the adapter supports the required formats.");
        } else {
            eprintln!("\n[Error] {}", msg);
            if let Some(loc) = info.location() {
                eprintln!("  at {}:{}:{}", loc.file(), loc.line(), loc.column());
            }
        }
    }));

    let mut config = ViewerConfig::load();
    if let Some(dir) = asset_dir {
        config.asset_root = dir;
    }
    log::info!(
        "bokeh-viewer {} (built {} {}), assets in {}",
        env!("CARGO_PKG_VERSION"),
        env!("BOKEH_BUILD_DATE"),
        env!("BOKEH_BUILD_TIME"),
        config.asset_root.display()
    );

    let title = config.window_title.clone();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window_width, config.window_height])
            .with_title(title.clone()),
        renderer: eframe::Renderer::Wgpu,
        ..Default::default()
    };

    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| Ok(Box::new(app::ViewerApp::new(cc, config, trace_guard)))),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run: {}", e))
}

/// Console output for tracing events, plus a Chrome trace when `BOKEH_TRACE=1`.
fn init_tracing(default_filter: &str) -> Option<tracing_chrome::FlushGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);

    let (chrome_layer, guard) = if std::env::var("BOKEH_TRACE").ok().as_deref() == Some("1") {
        let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new().file("trace.json").build();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(chrome_layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    guard
}
