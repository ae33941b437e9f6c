//! Depth-of-field post-processor.
//!
//! Two offscreen passes (scene color, encoded depth) feed a full-screen
//! bokeh shader drawn with an orthographic camera. Parameters reach the
//! shader through a fixed binding table; ring/sample counts are shader
//! constants and force a pipeline rebuild instead.

use bytemuck::{Pod, Zeroable};
use tracing::debug;

use super::camera::{OrthographicCamera, PerspectiveCamera};
use super::frame::{OffscreenTarget, RenderBackend, RenderTarget, ViewportSize};
use super::material::DepthMaterial;
use super::params::{EffectKey, EffectParams, ShaderQuality};
use super::scene::{OverrideMaterial, Scene};

/// Z of the compositor quad; the ortho camera sits at z = 100.
pub const QUAD_Z: f32 = -500.0;

/// Scalar uniforms of the bokeh shader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    TextureWidth,
    TextureHeight,
    FocalDepth,
    FocalLength,
    Fstop,
    Maxblur,
    ShowFocus,
    Manualdof,
    Vignetting,
    Depthblur,
    Threshold,
    Gain,
    Bias,
    Fringe,
    Znear,
    Zfar,
    Noise,
    Dithering,
    Pentagon,
    ShaderFocus,
}

/// Parameters copied into the shader on every sync. `enabled` is absent: it
/// drives the frame protocol, not the shader.
pub const BINDINGS: &[(EffectKey, UniformSlot)] = &[
    (EffectKey::FocalDepth, UniformSlot::FocalDepth),
    (EffectKey::Fstop, UniformSlot::Fstop),
    (EffectKey::Maxblur, UniformSlot::Maxblur),
    (EffectKey::Vignetting, UniformSlot::Vignetting),
    (EffectKey::Depthblur, UniformSlot::Depthblur),
    (EffectKey::Threshold, UniformSlot::Threshold),
    (EffectKey::Gain, UniformSlot::Gain),
    (EffectKey::Bias, UniformSlot::Bias),
    (EffectKey::Fringe, UniformSlot::Fringe),
    (EffectKey::FocalLength, UniformSlot::FocalLength),
    (EffectKey::Noise, UniformSlot::Noise),
    (EffectKey::Dithering, UniformSlot::Dithering),
    (EffectKey::ShaderFocus, UniformSlot::ShaderFocus),
    (EffectKey::ShowFocus, UniformSlot::ShowFocus),
    (EffectKey::Manualdof, UniformSlot::Manualdof),
    (EffectKey::Pentagon, UniformSlot::Pentagon),
];

/// Bokeh shader uniform block. Mirrors `struct Bokeh` in the WGSL source;
/// booleans are stored as 0.0 / 1.0.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BokehUniforms {
    /// Autofocus sample point in UV space (used when shaderFocus is on)
    pub focus_coords: [f32; 2],
    pub texture_width: f32,
    pub texture_height: f32,
    pub focal_depth: f32,
    pub focal_length: f32,
    pub fstop: f32,
    pub maxblur: f32,
    pub show_focus: f32,
    pub manualdof: f32,
    pub vignetting: f32,
    pub depthblur: f32,
    pub threshold: f32,
    pub gain: f32,
    pub bias: f32,
    pub fringe: f32,
    pub znear: f32,
    pub zfar: f32,
    pub noise: f32,
    pub dithering: f32,
    pub pentagon: f32,
    pub shader_focus: f32,
    pub _pad: [f32; 2],
}

impl Default for BokehUniforms {
    fn default() -> Self {
        Self {
            focus_coords: [0.5, 0.5],
            texture_width: 1.0,
            texture_height: 1.0,
            focal_depth: 1.0,
            focal_length: 24.0,
            fstop: 0.9,
            maxblur: 1.0,
            show_focus: 0.0,
            manualdof: 0.0,
            vignetting: 0.0,
            depthblur: 0.0,
            threshold: 0.5,
            gain: 2.0,
            bias: 0.5,
            fringe: 0.7,
            znear: 0.1,
            zfar: 100.0,
            noise: 1.0,
            dithering: 0.0001,
            pentagon: 0.0,
            shader_focus: 1.0,
            _pad: [0.0; 2],
        }
    }
}

impl BokehUniforms {
    pub fn get(&self, slot: UniformSlot) -> f32 {
        *self.slot(slot)
    }

    pub fn set(&mut self, slot: UniformSlot, value: f32) {
        *self.slot_mut(slot) = value;
    }

    fn slot(&self, slot: UniformSlot) -> &f32 {
        match slot {
            UniformSlot::TextureWidth => &self.texture_width,
            UniformSlot::TextureHeight => &self.texture_height,
            UniformSlot::FocalDepth => &self.focal_depth,
            UniformSlot::FocalLength => &self.focal_length,
            UniformSlot::Fstop => &self.fstop,
            UniformSlot::Maxblur => &self.maxblur,
            UniformSlot::ShowFocus => &self.show_focus,
            UniformSlot::Manualdof => &self.manualdof,
            UniformSlot::Vignetting => &self.vignetting,
            UniformSlot::Depthblur => &self.depthblur,
            UniformSlot::Threshold => &self.threshold,
            UniformSlot::Gain => &self.gain,
            UniformSlot::Bias => &self.bias,
            UniformSlot::Fringe => &self.fringe,
            UniformSlot::Znear => &self.znear,
            UniformSlot::Zfar => &self.zfar,
            UniformSlot::Noise => &self.noise,
            UniformSlot::Dithering => &self.dithering,
            UniformSlot::Pentagon => &self.pentagon,
            UniformSlot::ShaderFocus => &self.shader_focus,
        }
    }

    fn slot_mut(&mut self, slot: UniformSlot) -> &mut f32 {
        match slot {
            UniformSlot::TextureWidth => &mut self.texture_width,
            UniformSlot::TextureHeight => &mut self.texture_height,
            UniformSlot::FocalDepth => &mut self.focal_depth,
            UniformSlot::FocalLength => &mut self.focal_length,
            UniformSlot::Fstop => &mut self.fstop,
            UniformSlot::Maxblur => &mut self.maxblur,
            UniformSlot::ShowFocus => &mut self.show_focus,
            UniformSlot::Manualdof => &mut self.manualdof,
            UniformSlot::Vignetting => &mut self.vignetting,
            UniformSlot::Depthblur => &mut self.depthblur,
            UniformSlot::Threshold => &mut self.threshold,
            UniformSlot::Gain => &mut self.gain,
            UniformSlot::Bias => &mut self.bias,
            UniformSlot::Fringe => &mut self.fringe,
            UniformSlot::Znear => &mut self.znear,
            UniformSlot::Zfar => &mut self.zfar,
            UniformSlot::Noise => &mut self.noise,
            UniformSlot::Dithering => &mut self.dithering,
            UniformSlot::Pentagon => &mut self.pentagon,
            UniformSlot::ShaderFocus => &mut self.shader_focus,
        }
    }
}

/// Full-screen quad, its ortho camera, and the bokeh shader state.
#[derive(Clone, Debug)]
pub struct Compositor {
    pub camera: OrthographicCamera,
    /// Quad extent in pixels, centred on the origin at `QUAD_Z`
    pub quad_size: [f32; 2],
    pub uniforms: BokehUniforms,
    quality: ShaderQuality,
    needs_rebuild: bool,
}

impl Compositor {
    pub fn new(size: ViewportSize, quality: ShaderQuality) -> Self {
        let (w, h) = (size.width as f32, size.height as f32);
        Self {
            camera: OrthographicCamera::for_viewport(w, h),
            quad_size: [w, h],
            uniforms: BokehUniforms::default(),
            quality,
            // First draw compiles the pipeline
            needs_rebuild: true,
        }
    }

    pub fn quality(&self) -> ShaderQuality {
        self.quality
    }

    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    /// Return and clear the rebuild flag.
    pub fn take_rebuild(&mut self) -> bool {
        std::mem::replace(&mut self.needs_rebuild, false)
    }

    /// Model matrix placing the unit quad (-0.5..0.5) over the viewport.
    pub fn quad_matrix(&self) -> glam::Mat4 {
        glam::Mat4::from_scale_rotation_translation(
            glam::Vec3::new(self.quad_size[0], self.quad_size[1], 1.0),
            glam::Quat::IDENTITY,
            glam::Vec3::new(0.0, 0.0, QUAD_Z),
        )
    }

    fn set_quality(&mut self, quality: ShaderQuality) {
        self.quality = quality;
        self.needs_rebuild = true;
    }

    fn resize(&mut self, size: ViewportSize) {
        let (w, h) = (size.width as f32, size.height as f32);
        self.camera.set_viewport(w, h);
        self.quad_size = [w, h];
        self.uniforms.texture_width = w;
        self.uniforms.texture_height = h;
    }
}

/// Post-processor state. Render targets live in the backend; this holds
/// everything the frame protocol and the shader need.
#[derive(Clone, Debug)]
pub struct DepthOfField {
    pub enabled: bool,
    pub compositor: Compositor,
    pub depth_material: DepthMaterial,
    size: ViewportSize,
}

impl DepthOfField {
    pub fn new(size: ViewportSize, camera: &PerspectiveCamera, quality: ShaderQuality) -> Self {
        let mut compositor = Compositor::new(size, quality);
        compositor.uniforms.texture_width = size.width as f32;
        compositor.uniforms.texture_height = size.height as f32;
        Self {
            enabled: true,
            compositor,
            depth_material: DepthMaterial::new(camera.near, camera.far),
            size,
        }
    }

    pub fn size(&self) -> ViewportSize {
        self.size
    }

    /// Push the parameter record into the shader, the post-processor and the
    /// camera. Idempotent.
    pub fn sync_parameters(&mut self, params: &EffectParams, camera: &mut PerspectiveCamera) {
        for &(key, slot) in BINDINGS {
            self.compositor.uniforms.set(slot, params.get(key).as_f32());
        }

        self.enabled = params.enabled;
        self.compositor.uniforms.znear = camera.near;
        self.compositor.uniforms.zfar = camera.far;
        self.depth_material = DepthMaterial::new(camera.near, camera.far);
        camera.set_focal_length(params.focal_length);
    }

    /// Change the kernel shape. Uniform values are left alone.
    pub fn set_shader_quality(&mut self, quality: ShaderQuality) {
        if quality != self.compositor.quality {
            debug!(rings = quality.rings, samples = quality.samples, "bokeh shader quality changed");
        }
        self.compositor.set_quality(quality);
    }

    pub fn resize(&mut self, size: ViewportSize) {
        self.size = size;
        self.compositor.resize(size);
    }

    /// Run the frame protocol: two offscreen passes and the composite when
    /// enabled, a single direct pass otherwise.
    pub fn render<B: RenderBackend>(&mut self, backend: &mut B, scene: &mut Scene, camera: &PerspectiveCamera) {
        if self.enabled {
            backend.set_render_target(RenderTarget::Offscreen(OffscreenTarget::Color));
            backend.clear();
            backend.render_scene(scene, camera);

            scene.override_material = Some(OverrideMaterial::Depth(self.depth_material));
            backend.set_render_target(RenderTarget::Offscreen(OffscreenTarget::Depth));
            backend.clear();
            backend.render_scene(scene, camera);
            scene.override_material = None;

            backend.set_render_target(RenderTarget::Display);
            backend.render_compositor(&mut self.compositor);
        } else {
            scene.override_material = None;

            backend.set_render_target(RenderTarget::Display);
            backend.clear();
            backend.render_scene(scene, camera);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::params::{ControlKind, ParamValue, PANEL_CONTROLS};

    fn setup() -> (DepthOfField, PerspectiveCamera) {
        let camera = PerspectiveCamera::new(70.0, 1.0, 1.0, 10.0);
        let dof = DepthOfField::new(ViewportSize::new(640, 480), &camera, ShaderQuality::default());
        (dof, camera)
    }

    #[test]
    fn test_uniform_block_layout() {
        assert_eq!(std::mem::size_of::<BokehUniforms>(), 96);
    }

    #[test]
    fn test_bindings_exclude_enabled() {
        assert!(!BINDINGS.iter().any(|(k, _)| *k == EffectKey::Enabled));
        assert_eq!(BINDINGS.len(), EffectKey::ALL.len() - 1);
    }

    #[test]
    fn test_sync_copies_bound_values() {
        let (mut dof, mut camera) = setup();
        let params = EffectParams::default();
        dof.sync_parameters(&params, &mut camera);

        let u = &dof.compositor.uniforms;
        assert_eq!(u.focal_depth, 3.9);
        assert_eq!(u.fstop, 17.85);
        assert_eq!(u.maxblur, 1.45);
        assert_eq!(u.vignetting, 1.0);
        assert_eq!(u.depthblur, 0.0);
        assert_eq!(u.noise, 1.0);
        assert_eq!(u.shader_focus, 0.0);
        assert_eq!(u.znear, 1.0);
        assert_eq!(u.zfar, 10.0);
        assert!(dof.enabled);
        assert_eq!(dof.depth_material, DepthMaterial::new(1.0, 10.0));
        assert!((camera.focal_length() - 35.0).abs() < 1e-3);
    }

    #[test]
    fn test_sync_every_panel_value() {
        let (mut dof, mut camera) = setup();
        let mut params = EffectParams::default();
        for (key, _) in PANEL_CONTROLS {
            if key.is_toggle() {
                params.set(*key, ParamValue::Bool(!params.get(*key).as_bool()));
            } else {
                params.set(*key, ParamValue::Float(params.get(*key).as_f32() * 0.5 + 0.01));
            }
        }
        dof.sync_parameters(&params, &mut camera);
        for &(key, slot) in BINDINGS {
            assert_eq!(dof.compositor.uniforms.get(slot), params.get(key).as_f32(), "{key}");
        }
        assert!(!dof.enabled);
    }

    #[test]
    fn test_sync_slider_range_endpoints() {
        let (mut dof, mut camera) = setup();
        for (key, kind) in PANEL_CONTROLS {
            let ControlKind::Slider { min, max, .. } = *kind else {
                continue;
            };
            let slot = BINDINGS
                .iter()
                .find(|(k, _)| k == key)
                .map(|&(_, slot)| slot)
                .unwrap();
            for value in [min, max] {
                let mut params = EffectParams::default();
                params.set(*key, ParamValue::Float(value));
                dof.sync_parameters(&params, &mut camera);
                assert_eq!(dof.compositor.uniforms.get(slot), value, "{key} = {value}");
                if *key == EffectKey::FocalLength {
                    assert!((camera.focal_length() - value).abs() < 1e-3, "{key} = {value}");
                }
            }
        }
    }

    #[test]
    fn test_sync_idempotent() {
        let (mut dof, mut camera) = setup();
        let params = EffectParams::default();
        dof.sync_parameters(&params, &mut camera);
        let uniforms = dof.compositor.uniforms;
        let fov = camera.fov;
        dof.sync_parameters(&params, &mut camera);
        assert_eq!(dof.compositor.uniforms, uniforms);
        assert_eq!(camera.fov, fov);
    }

    #[test]
    fn test_sync_follows_clip_planes() {
        let (mut dof, mut camera) = setup();
        camera.near = 0.5;
        camera.far = 50.0;
        dof.sync_parameters(&EffectParams::default(), &mut camera);
        assert_eq!(dof.compositor.uniforms.znear, 0.5);
        assert_eq!(dof.compositor.uniforms.zfar, 50.0);
        assert_eq!(dof.depth_material, DepthMaterial::new(0.5, 50.0));
    }

    #[test]
    fn test_quality_change_marks_rebuild_only() {
        let (mut dof, mut camera) = setup();
        dof.sync_parameters(&EffectParams::default(), &mut camera);
        assert!(dof.compositor.take_rebuild());
        assert!(!dof.compositor.needs_rebuild());

        let uniforms = dof.compositor.uniforms;
        dof.set_shader_quality(ShaderQuality::new(8, 13));
        assert!(dof.compositor.needs_rebuild());
        assert_eq!(dof.compositor.quality(), ShaderQuality::new(8, 13));
        assert_eq!(dof.compositor.uniforms, uniforms);
    }

    #[test]
    fn test_resize_updates_texture_size_and_quad() {
        let (mut dof, _) = setup();
        dof.resize(ViewportSize::new(1024, 512));
        assert_eq!(dof.size(), ViewportSize::new(1024, 512));
        assert_eq!(dof.compositor.uniforms.texture_width, 1024.0);
        assert_eq!(dof.compositor.uniforms.texture_height, 512.0);
        assert_eq!(dof.compositor.quad_size, [1024.0, 512.0]);
        assert_eq!(dof.compositor.camera.right, 512.0);
        assert_eq!(dof.compositor.camera.top, 256.0);
    }

    #[test]
    fn test_quad_fills_clip_space() {
        let (dof, _) = setup();
        let c = &dof.compositor;
        let mvp = c.camera.view_proj_matrix() * c.quad_matrix();
        let corner = mvp.project_point3(glam::Vec3::new(0.5, 0.5, 0.0));
        assert!((corner.x - 1.0).abs() < 1e-5);
        assert!((corner.y - 1.0).abs() < 1e-5);
    }
}
