//! 3D viewport widget for egui

use std::sync::Arc;

use egui::{Response, Sense, Ui};

use super::context::AppContext;
use super::frame::{FrameDriver, ViewportSize};
use super::renderer::WgpuRenderer;

/// Central-panel viewport: drives one frame per paint and shows the
/// renderer's display texture.
pub struct Viewport {
    renderer: Option<WgpuRenderer>,
    driver: FrameDriver,
    texture_id: Option<egui::TextureId>,
    registered_generation: u64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new()
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self {
            renderer: None,
            driver: FrameDriver::new(),
            texture_id: None,
            registered_generation: 0,
        }
    }

    /// Create the renderer the first time a wgpu context is available.
    pub fn ensure_renderer(&mut self, render_state: &egui_wgpu::RenderState, clear_color: u32) {
        if self.renderer.is_some() {
            return;
        }
        self.renderer = Some(WgpuRenderer::new(
            Arc::new(render_state.device.clone()),
            Arc::new(render_state.queue.clone()),
            clear_color,
        ));
    }

    /// Allocate the remaining panel space, render into it and paint the result.
    pub fn show(
        &mut self,
        ui: &mut Ui,
        ctx: &mut AppContext,
        render_state: Option<&egui_wgpu::RenderState>,
    ) -> Response {
        let _span = tracing::info_span!("viewport_show").entered();
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::hover());

        let (Some(renderer), Some(render_state)) = (&mut self.renderer, render_state) else {
            ui.painter().rect_filled(rect, 0.0, egui::Color32::from_rgb(13, 13, 14));
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                "Initializing...",
                egui::FontId::default(),
                egui::Color32::GRAY,
            );
            return response;
        };

        let physical = rect.size() * ui.ctx().pixels_per_point();
        let size = ViewportSize::new(physical.x.round() as u32, physical.y.round() as u32);
        if !self.driver.frame(ctx, renderer, size) {
            return response;
        }

        // Display texture was recreated on resize
        if self.texture_id.is_none() || self.registered_generation != renderer.surface_generation() {
            let mut egui_renderer = render_state.renderer.write();
            if let Some(old_id) = self.texture_id.take() {
                egui_renderer.free_texture(&old_id);
            }
            let id = egui_renderer.register_native_texture(
                &render_state.device,
                renderer.display_view(),
                wgpu::FilterMode::Linear,
            );
            self.texture_id = Some(id);
            self.registered_generation = renderer.surface_generation();
        }

        if let Some(tex_id) = self.texture_id {
            ui.painter().image(
                tex_id,
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }
        response
    }
}
