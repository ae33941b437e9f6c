//! glTF model extraction.
//!
//! A loaded file becomes a standalone `ModelData` tree rooted at the first
//! child of the default scene. Each glTF mesh is flattened into one indexed
//! triangle list; nodes keep their names and local transforms.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::Vec3;
use physical_material::Vertex;
use tracing::debug;

use super::material::PhysicalMaterial;
use super::scene::Transform;
use crate::error::{Error, Result};

pub const MODEL_PATH: &str = "glb/blue.glb";
/// Node that receives the built material and the rotation animation
pub const ANIMATED_NODE: &str = "test";

static NEXT_MESH_ID: AtomicU64 = AtomicU64::new(1);

/// Indexed triangle mesh.
#[derive(Debug)]
pub struct MeshData {
    id: u64,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            id: NEXT_MESH_ID.fetch_add(1, Ordering::Relaxed),
            vertices,
            indices,
        }
    }

    /// Unique per mesh; used as the GPU cache key.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// One node of a loaded model.
#[derive(Debug)]
pub struct ModelNode {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<Arc<MeshData>>,
    pub material: Option<Arc<PhysicalMaterial>>,
    /// Indices into `ModelData::nodes`
    pub children: Vec<usize>,
}

/// Subtree produced by the model loader.
#[derive(Debug)]
pub struct ModelData {
    pub nodes: Vec<ModelNode>,
    pub root: usize,
    pub source: PathBuf,
}

impl ModelData {
    /// Document and buffers only; embedded images are never decoded.
    #[tracing::instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self> {
        let gltf::Gltf { document, blob } = gltf::Gltf::open(path)?;
        let buffers = gltf::import_buffers(&document, path.parent(), blob)?;
        Self::from_document(&document, &buffers, path)
    }

    /// Parse an in-memory `.glb` / `.gltf` (buffers must be embedded).
    pub fn from_slice(bytes: &[u8], source: impl Into<PathBuf>) -> Result<Self> {
        let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes)?;
        let buffers = gltf::import_buffers(&document, None, blob)?;
        Self::from_document(&document, &buffers, &source.into())
    }

    fn from_document(doc: &gltf::Document, buffers: &[gltf::buffer::Data], source: &Path) -> Result<Self> {
        let scene = doc
            .default_scene()
            .or_else(|| doc.scenes().next())
            .ok_or_else(|| Error::EmptyScene(source.to_path_buf()))?;
        let first = scene
            .nodes()
            .next()
            .ok_or_else(|| Error::EmptyScene(source.to_path_buf()))?;

        let mut nodes = Vec::new();
        let root = convert_node(&first, buffers, &mut nodes);
        debug!(nodes = nodes.len(), source = %source.display(), "model extracted");

        Ok(Self {
            nodes,
            root,
            source: source.to_path_buf(),
        })
    }

    /// Depth-first search by name, the root first.
    pub fn find(&self, name: &str) -> Option<usize> {
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if node.name == name {
                return Some(idx);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }
}

fn convert_node(node: &gltf::Node<'_>, buffers: &[gltf::buffer::Data], out: &mut Vec<ModelNode>) -> usize {
    let (translation, rotation, scale) = node.transform().decomposed();
    let (mesh, material) = match node.mesh() {
        Some(mesh) => {
            let (data, material) = read_mesh(&mesh, buffers);
            (Some(Arc::new(data)), Some(Arc::new(material)))
        }
        None => (None, None),
    };

    let idx = out.len();
    out.push(ModelNode {
        name: node.name().unwrap_or_default().to_string(),
        transform: Transform::from_decomposed(translation, rotation, scale),
        mesh,
        material,
        children: Vec::new(),
    });

    for child in node.children() {
        let child_idx = convert_node(&child, buffers, out);
        out[idx].children.push(child_idx);
    }
    idx
}

/// Merge all primitives of a mesh; material factors come from the first primitive.
fn read_mesh(mesh: &gltf::Mesh<'_>, buffers: &[gltf::buffer::Data]) -> (MeshData, PhysicalMaterial) {
    let mut vertices: Vec<Vertex> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut material = None;

    for prim in mesh.primitives() {
        if prim.mode() != gltf::mesh::Mode::Triangles {
            continue;
        }
        let reader = prim.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));
        let Some(positions) = reader.read_positions() else {
            continue;
        };
        let positions: Vec<[f32; 3]> = positions.collect();
        let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|n| n.collect());
        let uvs: Option<Vec<[f32; 2]>> = reader.read_tex_coords(0).map(|t| t.into_f32().collect());
        let prim_indices: Vec<u32> = match reader.read_indices() {
            Some(idx) => idx.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };

        let base = vertices.len() as u32;
        let start = vertices.len();
        for (i, position) in positions.iter().enumerate() {
            vertices.push(Vertex {
                position: *position,
                normal: normals.as_ref().and_then(|n| n.get(i).copied()).unwrap_or_default(),
                uv: uvs.as_ref().and_then(|t| t.get(i).copied()).unwrap_or_default(),
            });
        }
        let prim_indices: Vec<u32> = prim_indices.into_iter().map(|i| i + base).collect();
        if normals.is_none() {
            compute_normals(&mut vertices[start..], &prim_indices, base);
        }
        indices.extend(prim_indices);

        if material.is_none() {
            let pbr = prim.material().pbr_metallic_roughness();
            let [r, g, b, _] = pbr.base_color_factor();
            material = Some(PhysicalMaterial::from_factors(
                [r, g, b],
                pbr.roughness_factor(),
                pbr.metallic_factor(),
            ));
        }
    }

    (MeshData::new(vertices, indices), material.unwrap_or_default())
}

/// Area-weighted vertex normals for a primitive without its own.
fn compute_normals(vertices: &mut [Vertex], indices: &[u32], base: u32) {
    let mut acc = vec![Vec3::ZERO; vertices.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| (i - base) as usize);
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        let pa = Vec3::from(vertices[a].position);
        let pb = Vec3::from(vertices[b].position);
        let pc = Vec3::from(vertices[c].position);
        let n = (pb - pa).cross(pc - pa);
        acc[a] += n;
        acc[b] += n;
        acc[c] += n;
    }
    for (v, n) in vertices.iter_mut().zip(acc) {
        v.normal = n.normalize_or(Vec3::Y).into();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal binary glTF: root -> [test (triangle mesh), other].
    pub(crate) fn test_glb() -> Vec<u8> {
        build_glb("")
    }

    /// `extra` is spliced into the top-level JSON object (with a trailing comma).
    fn build_glb(extra: &str) -> Vec<u8> {
        let mut bin = Vec::new();
        for p in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for c in p {
                bin.extend_from_slice(&c.to_le_bytes());
            }
        }
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let json = format!(
            r#"{{
                "asset": {{"version": "2.0"}},
                {extra}
                "scene": 0,
                "scenes": [{{"nodes": [0]}}],
                "nodes": [
                    {{"name": "root", "children": [1, 2]}},
                    {{"name": "test", "mesh": 0, "translation": [1.0, 2.0, 3.0]}},
                    {{"name": "other"}}
                ],
                "meshes": [{{"primitives": [{{"attributes": {{"POSITION": 0}}, "indices": 1}}]}}],
                "buffers": [{{"byteLength": {len}}}],
                "bufferViews": [
                    {{"buffer": 0, "byteOffset": 0, "byteLength": 36}},
                    {{"buffer": 0, "byteOffset": 36, "byteLength": 6}}
                ],
                "accessors": [
                    {{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                      "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]}},
                    {{"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}}
                ]
            }}"#,
            len = bin.len()
        );
        let mut json = json.into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&bin);
        glb
    }

    #[test]
    fn test_extracts_subtree() {
        let model = ModelData::from_slice(&test_glb(), "mem.glb").unwrap();
        assert_eq!(model.nodes.len(), 3);
        assert_eq!(model.nodes[model.root].name, "root");
        assert_eq!(model.nodes[model.root].children.len(), 2);
    }

    #[test]
    fn test_find_named_node() {
        let model = ModelData::from_slice(&test_glb(), "mem.glb").unwrap();
        let idx = model.find(ANIMATED_NODE).unwrap();
        let node = &model.nodes[idx];
        assert_eq!(node.transform.translation, Vec3::new(1.0, 2.0, 3.0));
        assert!(model.find("missing").is_none());
    }

    #[test]
    fn test_mesh_and_computed_normals() {
        let model = ModelData::from_slice(&test_glb(), "mem.glb").unwrap();
        let node = &model.nodes[model.find(ANIMATED_NODE).unwrap()];
        let mesh = node.mesh.as_ref().unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        // Triangle lies in the XY plane, wound counter-clockwise
        for v in &mesh.vertices {
            assert!((v.normal[2] - 1.0).abs() < 1e-6);
            assert_eq!(v.uv, [0.0, 0.0]);
        }
        // Default glTF material factors
        let material = node.material.as_ref().unwrap();
        assert_eq!(material.roughness, 1.0);
        assert_eq!(material.metalness, 1.0);
    }

    #[test]
    fn test_invalid_bytes() {
        assert!(ModelData::from_slice(b"not a gltf", "bad.glb").is_err());
    }

    #[test]
    fn test_load_skips_image_decoding() {
        // The referenced image does not exist; only buffers are resolved
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("with_image.glb");
        std::fs::write(&path, build_glb(r#""images": [{"uri": "missing.png"}],"#)).unwrap();

        let model = ModelData::load(&path).unwrap();
        assert!(model.find(ANIMATED_NODE).is_some());
        assert_eq!(model.source, path);
    }

    #[test]
    fn test_missing_file() {
        assert!(ModelData::load(Path::new("no/such/model.glb")).is_err());
    }
}
