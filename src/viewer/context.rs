//! Application context: the scene, cameras, post-processor and parameters
//! the frame driver and the panel operate on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::Vec3;
use tracing::{info, warn};

use super::camera::PerspectiveCamera;
use super::environment::{EnvironmentMap, ENVIRONMENT_PATH};
use super::frame::ViewportSize;
use super::material::glb_material;
use super::model::{ModelData, ANIMATED_NODE, MODEL_PATH};
use super::params::{EffectParams, ShaderQuality};
use super::postfx::DepthOfField;
use super::scene::{Fog, NodeId, Scene};
use super::worker::{AssetKind, LoadCommand, LoadResult};
use crate::error::{Error, Result};

pub const FOG_COLOR: u32 = 0x0d0d0e;
pub const FOG_NEAR: f32 = 0.7;
pub const FOG_FAR: f32 = 17.0;

pub const CAMERA_FOV: f32 = 70.0;
pub const CAMERA_NEAR: f32 = 1.0;
pub const CAMERA_FAR: f32 = 10.0;
pub const CAMERA_DISTANCE: f32 = 5.0;

/// Asset loading progress. The model is requested only after the
/// environment result (success or failure) has arrived, and the material maps
/// once the model is attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStage {
    Idle,
    Environment,
    Model,
    Textures,
    Done,
}

pub struct AppContext {
    pub scene: Scene,
    pub camera: PerspectiveCamera,
    pub postfx: DepthOfField,
    pub params: EffectParams,
    pub quality: ShaderQuality,
    /// Nodes rotated every frame
    pub animated: Vec<NodeId>,
    asset_root: PathBuf,
    stage: LoadStage,
}

impl AppContext {
    /// Build the scene and post-processor and push the initial parameters.
    pub fn new(asset_root: impl Into<PathBuf>, viewport: ViewportSize) -> Self {
        let mut scene = Scene::new();
        scene.fog = Some(Fog::new(FOG_COLOR, FOG_NEAR, FOG_FAR));

        let mut camera = PerspectiveCamera::new(CAMERA_FOV, viewport.aspect(), CAMERA_NEAR, CAMERA_FAR);
        camera.look_at(Vec3::new(0.0, 0.0, CAMERA_DISTANCE), Vec3::ZERO);

        let quality = ShaderQuality::default();
        let postfx = DepthOfField::new(viewport, &camera, quality);

        let mut ctx = Self {
            scene,
            camera,
            postfx,
            params: EffectParams::default(),
            quality,
            animated: Vec::new(),
            asset_root: asset_root.into(),
            stage: LoadStage::Idle,
        };
        ctx.sync_parameters();
        ctx
    }

    pub fn asset_root(&self) -> &Path {
        &self.asset_root
    }

    pub fn stage(&self) -> LoadStage {
        self.stage
    }

    /// First load request; the rest follows from `apply_load_result`.
    pub fn start_loading(&mut self) -> LoadCommand {
        self.stage = LoadStage::Environment;
        LoadCommand::Environment(self.asset_root.join(ENVIRONMENT_PATH))
    }

    /// Push the parameter record into the shader, post-processor and camera.
    pub fn sync_parameters(&mut self) {
        self.postfx.sync_parameters(&self.params, &mut self.camera);
    }

    pub fn set_shader_quality(&mut self, quality: ShaderQuality) {
        self.quality = quality;
        self.postfx.set_shader_quality(quality);
    }

    /// Viewport changed: post-processor sizes and camera aspect.
    pub fn resize(&mut self, size: ViewportSize) {
        self.postfx.resize(size);
        self.camera.set_aspect(size.aspect());
    }

    /// Apply a loader result. Returns the next request, if any.
    pub fn apply_load_result(&mut self, result: LoadResult) -> Option<LoadCommand> {
        match result {
            LoadResult::EnvironmentReady(env) => {
                self.install_environment(env);
                self.request_model()
            }
            LoadResult::ModelReady(model) => match self.install_model(&model) {
                Ok(node) => self.request_textures(node),
                Err(e) => {
                    warn!("{}: {e}", model.source.display());
                    self.stage = LoadStage::Done;
                    None
                }
            },
            LoadResult::TexturesReady(textures) => {
                let count = textures.len();
                for data in textures {
                    self.scene.textures.insert(data);
                }
                info!(count, "material textures installed");
                self.stage = LoadStage::Done;
                None
            }
            LoadResult::Failed { kind, path, error } => {
                warn!(path = %path.display(), "failed to load {kind:?}: {error}");
                match kind {
                    AssetKind::Environment => self.request_model(),
                    AssetKind::Model => {
                        self.stage = LoadStage::Done;
                        None
                    }
                }
            }
        }
    }

    fn request_model(&mut self) -> Option<LoadCommand> {
        if self.stage != LoadStage::Environment {
            return None;
        }
        self.stage = LoadStage::Model;
        Some(LoadCommand::Model(self.asset_root.join(MODEL_PATH)))
    }

    /// Maps of the node's material; skipped when it has none.
    fn request_textures(&mut self, node: NodeId) -> Option<LoadCommand> {
        let sources = self
            .scene
            .node(node)
            .material
            .as_ref()
            .map(|m| m.texture_sources())
            .unwrap_or_default();
        if sources.is_empty() {
            self.stage = LoadStage::Done;
            return None;
        }
        self.stage = LoadStage::Textures;
        Some(LoadCommand::Textures(sources))
    }

    pub fn install_environment(&mut self, env: EnvironmentMap) {
        info!(width = env.width(), height = env.height(), "environment installed");
        self.scene.environment = Some(Arc::new(env));
    }

    /// Attach a loaded subtree, give its `test` node the built material and
    /// register it for rotation. Nothing is attached when the node is missing.
    pub fn install_model(&mut self, model: &ModelData) -> Result<NodeId> {
        if model.find(ANIMATED_NODE).is_none() {
            return Err(Error::NodeNotFound(ANIMATED_NODE.to_string()));
        }

        let root = self.scene.root();
        let subtree = self.scene.attach_model(root, model);
        let node = self
            .scene
            .find_by_name(subtree, ANIMATED_NODE)
            .ok_or_else(|| Error::NodeNotFound(ANIMATED_NODE.to_string()))?;

        self.scene.node_mut(node).material = Some(Arc::new(glb_material(&self.asset_root)));
        self.animated.push(node);
        info!(nodes = self.scene.len(), "model attached");
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::environment::prefilter;
    use crate::viewer::material::{ColorSpace, TextureData, TextureSource, BASE_COLOR_MAP};
    use crate::viewer::model::tests::test_glb;

    fn ctx() -> AppContext {
        AppContext::new("assets", ViewportSize::new(800, 600))
    }

    #[test]
    fn test_initial_state() {
        let ctx = ctx();
        let fog = ctx.scene.fog.unwrap();
        assert_eq!(fog, Fog::new(0x0d0d0e, 0.7, 17.0));
        assert!((ctx.camera.position().z - 5.0).abs() < 1e-5);
        assert_eq!(ctx.camera.near, 1.0);
        assert_eq!(ctx.camera.far, 10.0);
        // Initial sync already ran
        assert_eq!(ctx.postfx.compositor.uniforms.focal_depth, 3.9);
        assert!((ctx.camera.focal_length() - 35.0).abs() < 1e-3);
        assert!(ctx.animated.is_empty());
        assert_eq!(ctx.stage(), LoadStage::Idle);
    }

    #[test]
    fn test_environment_then_model() {
        let mut ctx = ctx();
        match ctx.start_loading() {
            LoadCommand::Environment(p) => assert_eq!(p, Path::new("assets").join(ENVIRONMENT_PATH)),
            other => panic!("unexpected {other:?}"),
        }
        let next = ctx.apply_load_result(LoadResult::EnvironmentReady(prefilter(1, 1, vec![1.0; 4])));
        assert!(ctx.scene.environment.is_some());
        match next {
            Some(LoadCommand::Model(p)) => assert_eq!(p, Path::new("assets").join(MODEL_PATH)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ctx.stage(), LoadStage::Model);
    }

    #[test]
    fn test_environment_failure_still_requests_model() {
        let mut ctx = ctx();
        ctx.start_loading();
        let next = ctx.apply_load_result(LoadResult::Failed {
            kind: AssetKind::Environment,
            path: PathBuf::from("x.hdr"),
            error: "boom".into(),
        });
        assert!(matches!(next, Some(LoadCommand::Model(_))));
        assert!(ctx.scene.environment.is_none());
    }

    #[test]
    fn test_model_install_requests_textures() {
        let mut ctx = ctx();
        let model = ModelData::from_slice(&test_glb(), "mem.glb").unwrap();
        let next = ctx.apply_load_result(LoadResult::ModelReady(model));
        assert_eq!(ctx.animated.len(), 1);

        let node = ctx.scene.node(ctx.animated[0]);
        assert_eq!(node.name, "test");
        let material = node.material.as_ref().unwrap();
        assert_eq!(material.metalness, 1.0);
        assert!(material.map.is_some());

        match next {
            Some(LoadCommand::Textures(sources)) => {
                assert_eq!(sources, material.texture_sources());
                assert_eq!(sources[0].path, Path::new("assets").join(BASE_COLOR_MAP));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ctx.stage(), LoadStage::Textures);
        // Nothing decoded yet; the renderer samples fallbacks
        assert!(ctx.scene.textures.is_empty());
    }

    #[test]
    fn test_textures_ready_fill_store() {
        let mut ctx = ctx();
        let model = ModelData::from_slice(&test_glb(), "mem.glb").unwrap();
        ctx.apply_load_result(LoadResult::ModelReady(model));

        let source = TextureSource::new(Path::new("assets").join(BASE_COLOR_MAP), ColorSpace::Srgb);
        let next = ctx.apply_load_result(LoadResult::TexturesReady(vec![TextureData {
            path: source.path.clone(),
            width: 1,
            height: 1,
            color_space: ColorSpace::Srgb,
            rgba: vec![0, 0, 255, 255],
        }]));
        assert!(next.is_none());
        assert_eq!(ctx.stage(), LoadStage::Done);
        assert_eq!(ctx.scene.textures.len(), 1);
        assert!(ctx.scene.textures.get(&source).is_some());
        assert_eq!(ctx.scene.textures.generation(), 1);
    }

    #[test]
    fn test_model_failure_leaves_scene_empty() {
        let mut ctx = ctx();
        let next = ctx.apply_load_result(LoadResult::Failed {
            kind: AssetKind::Model,
            path: PathBuf::from("x.glb"),
            error: "boom".into(),
        });
        assert!(next.is_none());
        assert!(ctx.scene.is_empty());
        assert!(ctx.animated.is_empty());
    }

    #[test]
    fn test_resize_updates_aspect() {
        let mut ctx = ctx();
        ctx.resize(ViewportSize::new(1000, 500));
        assert_eq!(ctx.camera.aspect, 2.0);
        assert_eq!(ctx.postfx.size(), ViewportSize::new(1000, 500));
    }
}
