//! Materials: the physical surface material and the depth-encoding override.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use physical_material::MaterialUniform;

use crate::error::{Error, Result};

pub const BASE_COLOR_MAP: &str = "glb/blue_baseColor.png";
pub const NORMAL_MAP: &str = "glb/blue_normal.png";
/// Occlusion in R, roughness in G, metalness in B
pub const OCC_ROUGH_METAL_MAP: &str = "glb/blue_occlusionRoughnessMetallic.png";

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

/// How texel values are interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    /// Color data; decoded to linear by the sampler
    Srgb,
    /// Non-color data (normals, roughness, ...)
    Linear,
}

/// Identifies one decoded texture: the same file may be sampled in more
/// than one color space.
pub type TextureKey = (PathBuf, ColorSpace);

/// A texture file plus how to interpret it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureSource {
    pub path: PathBuf,
    pub color_space: ColorSpace,
    /// Flip rows on decode. glTF UVs have their origin top-left, so maps
    /// authored for glTF are loaded unflipped.
    pub flip_y: bool,
}

impl TextureSource {
    pub fn new(path: impl Into<PathBuf>, color_space: ColorSpace) -> Self {
        Self {
            path: path.into(),
            color_space,
            flip_y: false,
        }
    }

    pub fn key(&self) -> TextureKey {
        (self.path.clone(), self.color_space)
    }

    /// Decode to tightly packed RGBA8.
    pub fn decode(&self) -> Result<TextureData> {
        let mut rgba = image::open(&self.path)?.to_rgba8();
        if rgba.width() == 0 || rgba.height() == 0 {
            return Err(Error::invalid_image(&self.path, "zero-sized image"));
        }
        if self.flip_y {
            image::imageops::flip_vertical_in_place(&mut rgba);
        }
        Ok(TextureData {
            path: self.path.clone(),
            width: rgba.width(),
            height: rgba.height(),
            color_space: self.color_space,
            rgba: rgba.into_raw(),
        })
    }
}

/// Decoded texture ready for upload.
pub struct TextureData {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub rgba: Vec<u8>,
}

impl TextureData {
    pub fn key(&self) -> TextureKey {
        (self.path.clone(), self.color_space)
    }
}

impl std::fmt::Debug for TextureData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureData")
            .field("path", &self.path)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("color_space", &self.color_space)
            .finish_non_exhaustive()
    }
}

/// Textures decoded by the loader, waiting to be sampled.
///
/// The generation advances on every insert so GPU-side material caches know
/// when to rebind.
#[derive(Default)]
pub struct TextureStore {
    textures: HashMap<TextureKey, Arc<TextureData>>,
    generation: u64,
}

impl TextureStore {
    pub fn insert(&mut self, data: TextureData) {
        self.textures.insert(data.key(), Arc::new(data));
        self.generation += 1;
    }

    pub fn get(&self, source: &TextureSource) -> Option<&Arc<TextureData>> {
        self.textures.get(&source.key())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

/// Metal/rough material with optional maps.
///
/// Scalars multiply through the maps, so the asset's packed texture decides
/// the final roughness and metalness when both scalars are 1.0.
#[derive(Clone, Debug)]
pub struct PhysicalMaterial {
    id: u64,
    pub color: [f32; 3],
    pub roughness: f32,
    pub metalness: f32,
    pub env_map_intensity: f32,
    pub ao_map_intensity: f32,
    pub map: Option<TextureSource>,
    pub normal_map: Option<TextureSource>,
    pub ao_map: Option<TextureSource>,
    pub roughness_map: Option<TextureSource>,
    pub metalness_map: Option<TextureSource>,
}

impl PhysicalMaterial {
    /// Untextured material from glTF-style factors.
    pub fn from_factors(color: [f32; 3], roughness: f32, metalness: f32) -> Self {
        Self {
            id: NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed),
            color,
            roughness,
            metalness,
            env_map_intensity: 1.0,
            ao_map_intensity: 1.0,
            map: None,
            normal_map: None,
            ao_map: None,
            roughness_map: None,
            metalness_map: None,
        }
    }

    /// Unique per constructed material; used as the GPU cache key.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Every map slot in binding order (map, normal, ao, roughness, metalness).
    pub fn texture_slots(&self) -> [Option<&TextureSource>; 5] {
        [
            self.map.as_ref(),
            self.normal_map.as_ref(),
            self.ao_map.as_ref(),
            self.roughness_map.as_ref(),
            self.metalness_map.as_ref(),
        ]
    }

    /// Distinct textures to decode; a packed map shared by several slots
    /// appears once.
    pub fn texture_sources(&self) -> Vec<TextureSource> {
        let mut sources: Vec<TextureSource> = Vec::new();
        for source in self.texture_slots().into_iter().flatten() {
            if !sources.contains(source) {
                sources.push(source.clone());
            }
        }
        sources
    }

    pub fn to_uniform(&self) -> MaterialUniform {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        MaterialUniform {
            color: [self.color[0], self.color[1], self.color[2], 1.0],
            params: [
                self.roughness,
                self.metalness,
                self.env_map_intensity,
                self.ao_map_intensity,
            ],
            flags: [
                flag(self.map.is_some()),
                flag(self.normal_map.is_some()),
                flag(self.ao_map.is_some()),
                flag(self.roughness_map.is_some() && self.metalness_map.is_some()),
            ],
        }
    }
}

impl Default for PhysicalMaterial {
    fn default() -> Self {
        Self::from_factors([1.0; 3], 1.0, 0.0)
    }
}

/// Material for the loaded model's `test` node.
///
/// One packed texture feeds the occlusion, roughness and metalness slots.
/// Roughness and metalness stay at 1.0: the packed texture already holds the
/// final values.
pub fn glb_material(asset_root: &Path) -> PhysicalMaterial {
    let packed = TextureSource::new(asset_root.join(OCC_ROUGH_METAL_MAP), ColorSpace::Linear);
    PhysicalMaterial {
        map: Some(TextureSource::new(asset_root.join(BASE_COLOR_MAP), ColorSpace::Srgb)),
        normal_map: Some(TextureSource::new(asset_root.join(NORMAL_MAP), ColorSpace::Linear)),
        ao_map: Some(packed.clone()),
        roughness_map: Some(packed.clone()),
        metalness_map: Some(packed),
        ..PhysicalMaterial::from_factors([1.0; 3], 1.0, 1.0)
    }
}

/// Encodes view depth as `1 - smoothstep(near, far, depth)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthMaterial {
    /// `mNear`
    pub near: f32,
    /// `mFar`
    pub far: f32,
}

impl DepthMaterial {
    pub fn new(near: f32, far: f32) -> Self {
        Self { near, far }
    }

    /// CPU mirror of the shader encoding.
    pub fn encode(&self, view_depth: f32) -> f32 {
        let t = ((view_depth - self.near) / (self.far - self.near)).clamp(0.0, 1.0);
        1.0 - t * t * (3.0 - 2.0 * t)
    }
}
