//! Scene graph: node arena, fog, environment slot and material override.

use std::f64::consts::{PI, TAU};
use std::sync::Arc;

use glam::{EulerRot, Mat4, Quat, Vec3};
use smallvec::SmallVec;

use super::environment::EnvironmentMap;
use super::material::{DepthMaterial, PhysicalMaterial, TextureStore};
use super::model::{MeshData, ModelData};

/// Handle into the scene's node arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Local transform: translation, Euler XYZ rotation (radians), scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// From glTF TRS (quaternion as `[x, y, z, w]`).
    pub fn from_decomposed(translation: [f32; 3], rotation: [f32; 4], scale: [f32; 3]) -> Self {
        let q = Quat::from_array(rotation).normalize();
        let (x, y, z) = q.to_euler(EulerRot::XYZ);
        Self {
            translation: Vec3::from(translation),
            rotation: Vec3::new(x, y, z),
            scale: Vec3::from(scale),
        }
    }

    pub fn matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z);
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.translation)
    }
}

/// Linear fog by view depth.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fog {
    /// 0xRRGGBB, sRGB
    pub color: u32,
    pub near: f32,
    pub far: f32,
}

impl Fog {
    pub fn new(color: u32, near: f32, far: f32) -> Self {
        Self { color, near, far }
    }

    pub fn linear_rgb(&self) -> [f32; 3] {
        hex_to_linear(self.color)
    }
}

/// 0xRRGGBB (sRGB) to linear RGB.
pub fn hex_to_linear(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| srgb_to_linear(((hex >> shift) & 0xff) as f32 / 255.0);
    [channel(16), channel(8), channel(0)]
}

pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Material applied to every mesh in place of its own.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OverrideMaterial {
    Depth(DepthMaterial),
}

#[derive(Debug)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<Arc<MeshData>>,
    pub material: Option<Arc<PhysicalMaterial>>,
    pub parent: Option<NodeId>,
    pub children: SmallVec<[NodeId; 4]>,
}

impl SceneNode {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            mesh: None,
            material: None,
            parent: None,
            children: SmallVec::new(),
        }
    }
}

/// A mesh ready to draw.
pub struct DrawItem<'a> {
    pub node: NodeId,
    pub world: Mat4,
    pub mesh: &'a Arc<MeshData>,
    pub material: Option<&'a Arc<PhysicalMaterial>>,
}

pub struct Scene {
    nodes: Vec<SceneNode>,
    root: NodeId,
    pub fog: Option<Fog>,
    pub environment: Option<Arc<EnvironmentMap>>,
    /// Decoded material maps; slots without an entry sample neutral fallbacks
    pub textures: TextureStore,
    pub override_material: Option<OverrideMaterial>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            nodes: vec![SceneNode::new("Scene")],
            root: NodeId(0),
            fog: None,
            environment: None,
            textures: TextureStore::default(),
            override_material: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> &SceneNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SceneNode {
        &mut self.nodes[id.0]
    }

    /// Add an empty node under `parent`.
    pub fn add_node(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = SceneNode::new(name);
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Copy a loaded model subtree under `parent`. Returns the new subtree root.
    pub fn attach_model(&mut self, parent: NodeId, model: &ModelData) -> NodeId {
        self.attach_model_node(parent, model, model.root)
    }

    fn attach_model_node(&mut self, parent: NodeId, model: &ModelData, idx: usize) -> NodeId {
        let src = &model.nodes[idx];
        let id = self.add_node(parent, src.name.clone());
        {
            let node = &mut self.nodes[id.0];
            node.transform = src.transform;
            node.mesh = src.mesh.clone();
            node.material = src.material.clone();
        }
        for &child in &src.children {
            self.attach_model_node(id, model, child);
        }
        id
    }

    /// Depth-first search by name starting at (and including) `from`.
    pub fn find_by_name(&self, from: NodeId, name: &str) -> Option<NodeId> {
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if node.name == name {
                return Some(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    /// World matrix of a node (product of the parent chain).
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let mut m = self.nodes[id.0].transform.matrix();
        let mut parent = self.nodes[id.0].parent;
        while let Some(p) = parent {
            m = self.nodes[p.0].transform.matrix() * m;
            parent = self.nodes[p.0].parent;
        }
        m
    }

    /// Every node with a mesh, with its world matrix, in depth-first order.
    pub fn draw_items(&self) -> Vec<DrawItem<'_>> {
        let mut items = Vec::new();
        let mut stack = vec![(self.root, Mat4::IDENTITY)];
        while let Some((id, parent_world)) = stack.pop() {
            let node = &self.nodes[id.0];
            let world = parent_world * node.transform.matrix();
            if let Some(mesh) = &node.mesh {
                items.push(DrawItem {
                    node: id,
                    world,
                    mesh,
                    material: node.material.as_ref(),
                });
            }
            stack.extend(node.children.iter().rev().map(|&c| (c, world)));
        }
        items
    }
}

/// Rotation about X at `elapsed` seconds: half a turn every 7 seconds,
/// clockwise. Wrapped to one turn so f32 precision holds for long runs.
pub fn rotation_angle(elapsed: f64) -> f32 {
    (((-elapsed / 7.0) * PI) % TAU) as f32
}

/// Set rotation.x of every registered node. No-op for an empty registry.
pub fn animate(scene: &mut Scene, registry: &[NodeId], elapsed: f64) {
    let angle = rotation_angle(elapsed);
    for &id in registry {
        scene.node_mut(id).transform.rotation.x = angle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_hierarchy_and_find() {
        let mut scene = Scene::new();
        let a = scene.add_node(scene.root(), "a");
        let b = scene.add_node(a, "test");
        assert_eq!(scene.find_by_name(scene.root(), "test"), Some(b));
        assert_eq!(scene.find_by_name(a, "a"), Some(a));
        assert_eq!(scene.find_by_name(b, "a"), None);
        assert_eq!(scene.node(b).parent, Some(a));
        assert_eq!(scene.node(a).children.as_slice(), &[b]);
    }

    #[test]
    fn test_world_matrix_chain() {
        let mut scene = Scene::new();
        let a = scene.add_node(scene.root(), "a");
        let b = scene.add_node(a, "b");
        scene.node_mut(a).transform.translation = Vec3::new(1.0, 0.0, 0.0);
        scene.node_mut(b).transform.translation = Vec3::new(0.0, 2.0, 0.0);
        let p = scene.world_matrix(b).transform_point3(Vec3::ZERO);
        assert!(approx(p.x, 1.0) && approx(p.y, 2.0));
    }

    #[test]
    fn test_attach_model() {
        let model = ModelData::from_slice(&super::super::model::tests::test_glb(), "mem.glb").unwrap();
        let mut scene = Scene::new();
        let sub = scene.attach_model(scene.root(), &model);
        assert_eq!(scene.node(sub).name, "root");
        let test = scene.find_by_name(scene.root(), "test").unwrap();
        assert_eq!(scene.node(test).parent, Some(sub));

        let items = scene.draw_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].node, test);
        let origin = items[0].world.transform_point3(Vec3::ZERO);
        assert!(approx(origin.x, 1.0) && approx(origin.y, 2.0) && approx(origin.z, 3.0));
    }

    #[test]
    fn test_euler_roundtrip_from_quat() {
        let q = Quat::from_rotation_y(0.5);
        let t = Transform::from_decomposed([0.0; 3], q.to_array(), [1.0; 3]);
        assert!(approx(t.rotation.y, 0.5));
        let back = Quat::from_mat4(&t.matrix());
        assert!(back.abs_diff_eq(q, 1e-5) || back.abs_diff_eq(-q, 1e-5));
    }

    #[test]
    fn test_rotation_angle() {
        assert_eq!(rotation_angle(0.0), 0.0);
        assert!(approx(rotation_angle(7.0), -std::f32::consts::PI));
        assert!(approx(rotation_angle(3.5), -std::f32::consts::FRAC_PI_2));
        // Pure function of elapsed time
        assert_eq!(rotation_angle(123.456), rotation_angle(123.456));
        // Wraps after a full turn (14 s)
        assert!(approx(rotation_angle(14.0 + 3.5), rotation_angle(3.5)));
    }

    #[test]
    fn test_animate_registry() {
        let mut scene = Scene::new();
        let a = scene.add_node(scene.root(), "test");
        animate(&mut scene, &[a], 7.0);
        assert!(approx(scene.node(a).transform.rotation.x, -std::f32::consts::PI));

        // Empty registry is fine
        animate(&mut scene, &[], 1.0);
    }

    #[test]
    fn test_fog_color() {
        let fog = Fog::new(0x0d0d0e, 0.7, 17.0);
        let [r, g, b] = fog.linear_rgb();
        assert_eq!(r, g);
        assert!(b > g);
        assert!(r > 0.0 && r < 0.01);
    }
}
