//! Uniform blocks shared by the physical material shader and its callers.
//!
//! Every struct here is `#[repr(C)]` and mirrors a WGSL struct byte for byte.
//! Sizes are multiples of 16 so they can be bound directly as uniform buffers.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Per-frame camera and fog data (group 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FrameUniform {
    /// Combined view-projection matrix
    pub view_proj: [[f32; 4]; 4],
    /// View matrix only
    pub view: [[f32; 4]; 4],
    /// Camera world position
    pub camera_position: [f32; 3],
    pub _pad0: f32,
    /// Fog color (linear RGB)
    pub fog_color: [f32; 3],
    /// View-space depth where fog starts
    pub fog_near: f32,
    /// View-space depth where fog is opaque
    pub fog_far: f32,
    pub _pad1: [f32; 3],
}

impl FrameUniform {
    pub fn new(view: Mat4, proj: Mat4, position: Vec3) -> Self {
        Self {
            view_proj: (proj * view).to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            camera_position: position.into(),
            _pad0: 0.0,
            fog_color: [0.0; 3],
            fog_near: 0.0,
            fog_far: f32::MAX,
            _pad1: [0.0; 3],
        }
    }

    pub fn with_fog(mut self, color: [f32; 3], near: f32, far: f32) -> Self {
        self.fog_color = color;
        self.fog_near = near;
        self.fog_far = far;
        self
    }
}

/// Model transform uniform (group 2 in the material pipeline)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ModelUniform {
    /// Model matrix (world transform)
    pub model: [[f32; 4]; 4],
    /// Normal matrix (inverse transpose of model)
    pub normal_matrix: [[f32; 4]; 4],
}

impl ModelUniform {
    pub fn from_world(world: Mat4) -> Self {
        Self {
            model: world.to_cols_array_2d(),
            normal_matrix: world.inverse().transpose().to_cols_array_2d(),
        }
    }
}

impl Default for ModelUniform {
    fn default() -> Self {
        Self::from_world(Mat4::IDENTITY)
    }
}

/// Physical material parameters (group 1, binding 0)
///
/// Scalars multiply through the sampled maps: the final roughness is
/// `params.x * roughness_map.g` and the final metalness `params.y * metalness_map.b`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MaterialUniform {
    /// Base color (rgb), alpha unused
    pub color: [f32; 4],
    /// x=roughness, y=metalness, z=env_map_intensity, w=ao_map_intensity
    pub params: [f32; 4],
    /// Map presence flags: x=map, y=normal_map, z=ao_map, w=roughness/metalness maps
    pub flags: [f32; 4],
}

impl Default for MaterialUniform {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
            params: [1.0, 0.0, 1.0, 1.0],
            flags: [0.0; 4],
        }
    }
}

/// Environment lighting parameters (group 3, binding 2)
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct EnvUniform {
    /// Environment intensity multiplier
    pub intensity: f32,
    /// Index of the last (blurriest) mip level
    pub max_mip: f32,
    /// Whether an environment is installed (1.0 = yes, 0.0 = no)
    pub enabled: f32,
    pub _pad: f32,
}

impl Default for EnvUniform {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            max_mip: 0.0,
            enabled: 0.0,
            _pad: 0.0,
        }
    }
}
