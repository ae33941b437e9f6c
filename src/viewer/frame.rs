//! Frame driver and the render backend seam.
//!
//! The driver owns timing and resize detection; everything that touches the
//! GPU goes through [`RenderBackend`], so the frame protocol can be driven
//! against a recording backend in tests.

use std::time::{Duration, Instant};

use tracing::debug;

use super::camera::PerspectiveCamera;
use super::context::AppContext;
use super::postfx::Compositor;
use super::scene::{self, Scene};

/// Viewport size in physical pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Offscreen targets owned by the post-processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OffscreenTarget {
    /// Sharp scene color
    Color,
    /// Encoded view depth
    Depth,
}

/// Where the next clear / render goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// The surface shown in the viewport
    Display,
    Offscreen(OffscreenTarget),
}

/// GPU operations the frame protocol needs.
pub trait RenderBackend {
    /// Called once before the first render call of a frame.
    fn begin_frame(&mut self) {}
    /// Called once after the last render call of a frame.
    fn end_frame(&mut self) {}

    fn resize_surface(&mut self, size: ViewportSize);
    fn resize_target(&mut self, target: OffscreenTarget, size: ViewportSize);
    fn surface_size(&self) -> ViewportSize;
    fn target_size(&self, target: OffscreenTarget) -> ViewportSize;

    fn set_render_target(&mut self, target: RenderTarget);
    /// Clear the current target (color and depth).
    fn clear(&mut self);
    /// Draw the scene into the current target. Honors `scene.override_material`.
    fn render_scene(&mut self, scene: &Scene, camera: &PerspectiveCamera);
    /// Draw the full-screen compositor quad into the current target.
    fn render_compositor(&mut self, compositor: &mut Compositor);
}

/// Per-frame loop: resize, animate, dispatch.
pub struct FrameDriver {
    start: Instant,
    last_size: Option<ViewportSize>,
}

impl Default for FrameDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDriver {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            last_size: None,
        }
    }

    /// Size recorded at the last resize.
    pub fn last_size(&self) -> Option<ViewportSize> {
        self.last_size
    }

    /// Run one frame at the current time.
    pub fn frame<B: RenderBackend>(&mut self, ctx: &mut AppContext, backend: &mut B, viewport: ViewportSize) -> bool {
        let elapsed = self.start.elapsed();
        self.frame_at(ctx, backend, viewport, elapsed)
    }

    /// Run one frame at `elapsed` since start. Returns false when the
    /// viewport is empty and nothing was drawn.
    pub fn frame_at<B: RenderBackend>(
        &mut self,
        ctx: &mut AppContext,
        backend: &mut B,
        viewport: ViewportSize,
        elapsed: Duration,
    ) -> bool {
        let _span = tracing::info_span!("frame").entered();

        if viewport.is_empty() {
            return false;
        }

        if self.last_size != Some(viewport) {
            backend.resize_surface(viewport);
            backend.resize_target(OffscreenTarget::Color, viewport);
            backend.resize_target(OffscreenTarget::Depth, viewport);
            ctx.resize(viewport);
            self.last_size = Some(viewport);
            debug!("{} PX", viewport.width);
        }

        scene::animate(&mut ctx.scene, &ctx.animated, elapsed.as_secs_f64());

        backend.begin_frame();
        ctx.postfx.render(backend, &mut ctx.scene, &ctx.camera);
        backend.end_frame();
        true
    }
}
