//! Main application state and UI

use egui::{CentralPanel, RichText};

use super::config::ViewerConfig;
use super::context::AppContext;
use super::frame::ViewportSize;
use super::params::{ControlKind, ShaderQuality, PANEL_CONTROLS};
use super::viewport::Viewport;
use super::worker::LoaderHandle;

/// Main viewer application
pub struct ViewerApp {
    viewport: Viewport,
    context: AppContext,
    config: ViewerConfig,
    loader: Option<LoaderHandle>,
    _trace_guard: Option<tracing_chrome::FlushGuard>,
}

impl ViewerApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        config: ViewerConfig,
        trace_guard: Option<tracing_chrome::FlushGuard>,
    ) -> Self {
        let size = ViewportSize::new(config.window_width as u32, config.window_height as u32);
        let mut context = AppContext::new(config.asset_root.clone(), size);

        let loader = LoaderHandle::spawn();
        loader.request(context.start_loading());

        Self {
            viewport: Viewport::new(),
            context,
            config,
            loader: Some(loader),
            _trace_guard: trace_guard,
        }
    }

    /// Drain finished loads; each may queue the next request.
    fn process_loader_results(&mut self) {
        let Some(loader) = &self.loader else { return };
        while let Some(result) = loader.try_recv() {
            if let Some(next) = self.context.apply_load_result(result) {
                loader.request(next);
            }
        }
    }

    /// "Depth of Field" panel. Every edit pushes the whole record.
    fn effect_panel(&mut self, ctx: &egui::Context) {
        egui::Window::new("Depth of Field")
            .default_open(self.config.panel_open)
            .resizable(false)
            .anchor(egui::Align2::RIGHT_TOP, [-8.0, 8.0])
            .show(ctx, |ui| {
                let mut changed = false;
                for &(key, kind) in PANEL_CONTROLS {
                    match kind {
                        ControlKind::Toggle => {
                            if let Some(value) = self.context.params.bool_mut(key) {
                                changed |= ui.checkbox(value, key.name()).changed();
                            }
                        }
                        ControlKind::Slider { min, max, step } => {
                            if let Some(value) = self.context.params.float_mut(key) {
                                let mut slider = egui::Slider::new(value, min..=max).text(key.name());
                                if let Some(step) = step {
                                    slider = slider.step_by(step as f64);
                                }
                                changed |= ui.add(slider).changed();
                            }
                        }
                    }
                }
                if changed {
                    self.context.sync_parameters();
                }

                ui.separator();
                ui.label(RichText::new("Kernel").strong());
                let mut quality = self.context.quality;
                let rings = ui.add(egui::Slider::new(&mut quality.rings, 1..=8).text("rings")).changed();
                let samples = ui
                    .add(egui::Slider::new(&mut quality.samples, 1..=13).text("samples"))
                    .changed();
                if rings || samples {
                    self.context
                        .set_shader_quality(ShaderQuality::new(quality.rings, quality.samples));
                }
            });
    }
}

impl eframe::App for ViewerApp {
    fn on_exit(&mut self) {
        if let Some(mut loader) = self.loader.take() {
            loader.stop();
        }
    }

    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        let _span = tracing::info_span!("viewer_update").entered();

        self.process_loader_results();

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        let render_state = frame.wgpu_render_state();
        if let Some(render_state) = render_state {
            self.viewport.ensure_renderer(render_state, self.config.clear_color);
        }

        self.effect_panel(ctx);

        CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.viewport.show(ui, &mut self.context, render_state);
            });

        // Continuous animation
        ctx.request_repaint();
    }
}
