//! wgpu implementation of the render backend.
//!
//! Every `clear` is deferred into the load op of the next pass. Each render
//! call records and submits its own encoder, so uniform writes made for one
//! pass never leak into another.

use std::collections::HashMap;
use std::sync::Arc;

use physical_material::{
    BindGroupLayouts, FrameUniform, MaterialViews, ModelUniform, OutputOptions,
};
use tracing::{debug, debug_span};

mod pipelines;
mod postfx;
mod resources;
mod shaders;

use pipelines::{create_depth_pipeline, create_scene_pipeline, DepthPipeline};
use postfx::{create_bokeh_bind_group_layout, create_bokeh_pipeline, create_bokeh_sampler, BokehPipeline};
use resources::{
    DepthParams, DepthTexture, GpuEnvironment, GpuMaterial, GpuMesh, GpuTexture, ModelSlot, QuadUniform,
    RenderTexture,
};

use super::camera::PerspectiveCamera;
use super::environment::EnvironmentMap;
use super::frame::{OffscreenTarget, RenderBackend, RenderTarget, ViewportSize};
use super::material::{ColorSpace, PhysicalMaterial, TextureKey, TextureSource, TextureStore};
use super::postfx::{BokehUniforms, Compositor};
use super::scene::{hex_to_linear, OverrideMaterial, Scene};

/// Surface painted into the viewport. egui samples it as linear.
pub const DISPLAY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
/// Sharp scene color, kept linear and unclamped for the composite.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Encoded depth in [0, 1].
pub const DEPTH_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub struct WgpuRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    layouts: BindGroupLayouts,

    // Targets
    display: RenderTexture,
    surface_generation: u64,
    color: RenderTexture,
    depth_target: RenderTexture,
    depth_buffer: DepthTexture,
    current: RenderTarget,
    pending_clear: bool,
    clear_color: wgpu::Color,

    // Scene
    display_pipeline: wgpu::RenderPipeline,
    linear_pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    model_slots: Vec<ModelSlot>,
    meshes: HashMap<u64, GpuMesh>,
    materials: HashMap<u64, GpuMaterial>,
    textures: HashMap<TextureKey, GpuTexture>,
    default_material: PhysicalMaterial,
    white_srgb: GpuTexture,
    flat_normal: GpuTexture,
    white_linear: GpuTexture,
    material_sampler: wgpu::Sampler,
    environment: GpuEnvironment,

    // Depth override
    depth_pipeline: DepthPipeline,
    depth_params_buffer: wgpu::Buffer,
    depth_params_bind_group: wgpu::BindGroup,

    // Composite
    bokeh_layout: wgpu::BindGroupLayout,
    bokeh_sampler: wgpu::Sampler,
    bokeh_pipeline: Option<BokehPipeline>,
    bokeh_bind_group: Option<wgpu::BindGroup>,
    bokeh_buffer: wgpu::Buffer,
    quad_buffer: wgpu::Buffer,
}

impl WgpuRenderer {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, clear_color: u32) -> Self {
        let layouts = physical_material::create_bind_group_layouts(&device);
        let size = ViewportSize::new(1, 1);

        let display = RenderTexture::new(&device, "display_texture", DISPLAY_FORMAT, size);
        let color = RenderTexture::new(&device, "dof_color_target", COLOR_FORMAT, size);
        let depth_target = RenderTexture::new(&device, "dof_depth_target", DEPTH_TARGET_FORMAT, size);
        let depth_buffer = DepthTexture::new(&device, size);

        let display_pipeline =
            create_scene_pipeline(&device, &layouts, DISPLAY_FORMAT, OutputOptions::display(DISPLAY_FORMAT));
        let linear_pipeline = create_scene_pipeline(&device, &layouts, COLOR_FORMAT, OutputOptions::LINEAR);
        let depth_pipeline = create_depth_pipeline(&device, &layouts, DEPTH_TARGET_FORMAT);

        let frame_buffer = uniform_buffer(&device, "frame_uniform_buffer", std::mem::size_of::<FrameUniform>());
        let frame_bind_group = single_buffer_bind_group(&device, "frame_bind_group", &layouts.frame, &frame_buffer);

        let depth_params_buffer =
            uniform_buffer(&device, "depth_params_buffer", std::mem::size_of::<DepthParams>());
        let depth_params_bind_group = single_buffer_bind_group(
            &device,
            "depth_params_bind_group",
            &depth_pipeline.params_layout,
            &depth_params_buffer,
        );

        let white_srgb = GpuTexture::solid(&device, &queue, [255, 255, 255, 255], ColorSpace::Srgb);
        let flat_normal = GpuTexture::solid(&device, &queue, [128, 128, 255, 255], ColorSpace::Linear);
        let white_linear = GpuTexture::solid(&device, &queue, [255, 255, 255, 255], ColorSpace::Linear);
        let material_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("material_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let environment = GpuEnvironment::fallback(&device, &queue, &layouts.environment);

        let bokeh_layout = create_bokeh_bind_group_layout(&device);
        let bokeh_sampler = create_bokeh_sampler(&device);
        let bokeh_buffer = uniform_buffer(&device, "bokeh_uniform_buffer", std::mem::size_of::<BokehUniforms>());
        let quad_buffer = uniform_buffer(&device, "quad_uniform_buffer", std::mem::size_of::<QuadUniform>());

        let [r, g, b] = hex_to_linear(clear_color);
        Self {
            device,
            queue,
            layouts,
            display,
            surface_generation: 0,
            color,
            depth_target,
            depth_buffer,
            current: RenderTarget::Display,
            pending_clear: false,
            clear_color: wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: 1.0,
            },
            display_pipeline,
            linear_pipeline,
            frame_buffer,
            frame_bind_group,
            model_slots: Vec::new(),
            meshes: HashMap::new(),
            materials: HashMap::new(),
            textures: HashMap::new(),
            default_material: PhysicalMaterial::default(),
            white_srgb,
            flat_normal,
            white_linear,
            material_sampler,
            environment,
            depth_pipeline,
            depth_params_buffer,
            depth_params_bind_group,
            bokeh_layout,
            bokeh_sampler,
            bokeh_pipeline: None,
            bokeh_bind_group: None,
            bokeh_buffer,
            quad_buffer,
        }
    }

    /// View of the display surface, for registration with egui.
    pub fn display_view(&self) -> &wgpu::TextureView {
        &self.display.view
    }

    /// Bumped whenever the display texture is recreated.
    pub fn surface_generation(&self) -> u64 {
        self.surface_generation
    }

    fn target(&self, target: RenderTarget) -> &RenderTexture {
        match target {
            RenderTarget::Display => &self.display,
            RenderTarget::Offscreen(OffscreenTarget::Color) => &self.color,
            RenderTarget::Offscreen(OffscreenTarget::Depth) => &self.depth_target,
        }
    }

    fn color_load_op(&self) -> wgpu::LoadOp<wgpu::Color> {
        if self.pending_clear {
            wgpu::LoadOp::Clear(self.clear_color)
        } else {
            wgpu::LoadOp::Load
        }
    }

    /// Depth buffer sized for the current target.
    fn ensure_depth_buffer(&mut self) {
        let size = self.target(self.current).size;
        if self.depth_buffer.size != size {
            self.depth_buffer = DepthTexture::new(&self.device, size);
        }
    }

    fn ensure_model_slots(&mut self, count: usize) {
        while self.model_slots.len() < count {
            let buffer = uniform_buffer(&self.device, "model_uniform_buffer", std::mem::size_of::<ModelUniform>());
            let bind_group =
                single_buffer_bind_group(&self.device, "model_bind_group", &self.layouts.model, &buffer);
            self.model_slots.push(ModelSlot { buffer, bind_group });
        }
    }

    fn sync_environment(&mut self, env: Option<&EnvironmentMap>) {
        let wanted = env.map_or(0, |e| e.id());
        if self.environment.source_id == wanted {
            return;
        }
        self.environment = match env {
            Some(env) => {
                debug!(width = env.width(), mips = env.levels.len(), "uploading environment");
                GpuEnvironment::upload(&self.device, &self.queue, &self.layouts.environment, env)
            }
            None => GpuEnvironment::fallback(&self.device, &self.queue, &self.layouts.environment),
        };
    }

    /// Upload a map once the loader has decoded it.
    fn ensure_texture(&mut self, source: &TextureSource, store: &TextureStore) {
        let key = source.key();
        if self.textures.contains_key(&key) {
            return;
        }
        if let Some(data) = store.get(source) {
            debug!(path = %source.path.display(), width = data.width, height = data.height, "texture uploaded");
            let texture = GpuTexture::upload(&self.device, &self.queue, data);
            self.textures.insert(key, texture);
        }
    }

    /// Slot views in binding order; maps not uploaded yet use neutral fallbacks.
    fn material_views(&self, material: &PhysicalMaterial) -> [&wgpu::TextureView; 5] {
        let fallbacks = [
            &self.white_srgb,
            &self.flat_normal,
            &self.white_linear,
            &self.white_linear,
            &self.white_linear,
        ];
        let slots = material.texture_slots();
        std::array::from_fn(|i| {
            slots[i]
                .and_then(|s| self.textures.get(&s.key()))
                .map_or(&fallbacks[i].view, |t| &t.view)
        })
    }

    /// Build or refresh the material's bind group. Rebuilt when new decoded
    /// maps have arrived since it was last built.
    fn prepare_material(&mut self, material: &PhysicalMaterial, store: &TextureStore) {
        let generation = store.generation();
        if self
            .materials
            .get(&material.id())
            .is_some_and(|m| m.texture_generation == generation)
        {
            return;
        }
        for source in material.texture_slots().into_iter().flatten() {
            self.ensure_texture(source, store);
        }

        let [map, normal_map, ao_map, roughness_map, metalness_map] = self.material_views(material);
        let views = MaterialViews {
            map,
            normal_map,
            ao_map,
            roughness_map,
            metalness_map,
        };
        let buffer = physical_material::create_material_buffer(&self.device, &material.to_uniform());
        let bind_group = physical_material::create_material_bind_group(
            &self.device,
            &self.layouts.material,
            &buffer,
            &views,
            &self.material_sampler,
        );
        self.materials.insert(
            material.id(),
            GpuMaterial {
                buffer,
                bind_group,
                texture_generation: generation,
            },
        );
    }

    fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl RenderBackend for WgpuRenderer {
    fn resize_surface(&mut self, size: ViewportSize) {
        self.display = RenderTexture::new(&self.device, "display_texture", DISPLAY_FORMAT, size);
        self.surface_generation += 1;
    }

    fn resize_target(&mut self, target: OffscreenTarget, size: ViewportSize) {
        match target {
            OffscreenTarget::Color => {
                self.color = RenderTexture::new(&self.device, "dof_color_target", COLOR_FORMAT, size);
            }
            OffscreenTarget::Depth => {
                self.depth_target = RenderTexture::new(&self.device, "dof_depth_target", DEPTH_TARGET_FORMAT, size);
            }
        }
        // Composite samples the old views
        self.bokeh_bind_group = None;
    }

    fn surface_size(&self) -> ViewportSize {
        self.display.size
    }

    fn target_size(&self, target: OffscreenTarget) -> ViewportSize {
        self.target(RenderTarget::Offscreen(target)).size
    }

    fn set_render_target(&mut self, target: RenderTarget) {
        self.current = target;
    }

    fn clear(&mut self) {
        self.pending_clear = true;
    }

    fn render_scene(&mut self, scene: &Scene, camera: &PerspectiveCamera) {
        let _span = debug_span!("render_scene", target = ?self.current).entered();

        let mut frame = FrameUniform::new(camera.view_matrix(), camera.projection_matrix(), camera.position());
        if let Some(fog) = scene.fog {
            frame = frame.with_fog(fog.linear_rgb(), fog.near, fog.far);
        }
        self.queue.write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&frame));

        let items = scene.draw_items();
        self.ensure_model_slots(items.len());
        for (slot, item) in self.model_slots.iter().zip(&items) {
            let model = ModelUniform::from_world(item.world);
            self.queue.write_buffer(&slot.buffer, 0, bytemuck::bytes_of(&model));
        }

        let override_material = scene.override_material;
        match override_material {
            Some(OverrideMaterial::Depth(depth)) => {
                let params = DepthParams {
                    m_near: depth.near,
                    m_far: depth.far,
                    _pad: [0.0; 2],
                };
                self.queue
                    .write_buffer(&self.depth_params_buffer, 0, bytemuck::bytes_of(&params));
            }
            None => {
                self.sync_environment(scene.environment.as_deref());
                let default_material = self.default_material.clone();
                self.prepare_material(&default_material, &scene.textures);
                for item in &items {
                    if let Some(material) = item.material {
                        self.prepare_material(material, &scene.textures);
                    }
                }
            }
        }
        for item in &items {
            if !self.meshes.contains_key(&item.mesh.id()) {
                let mesh = GpuMesh::upload(&self.device, item.mesh);
                self.meshes.insert(item.mesh.id(), mesh);
            }
        }
        self.ensure_depth_buffer();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("scene_encoder") });
        {
            let target = self.target(self.current);
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: self.color_load_op(),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_buffer.view,
                    depth_ops: Some(wgpu::Operations {
                        load: if self.pending_clear {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_bind_group(0, &self.frame_bind_group, &[]);
            match override_material {
                Some(OverrideMaterial::Depth(_)) => {
                    pass.set_pipeline(&self.depth_pipeline.pipeline);
                    pass.set_bind_group(2, &self.depth_params_bind_group, &[]);
                    for (slot, item) in self.model_slots.iter().zip(&items) {
                        let Some(mesh) = self.meshes.get(&item.mesh.id()) else { continue };
                        pass.set_bind_group(1, &slot.bind_group, &[]);
                        pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                        pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                        pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                    }
                }
                None => {
                    let pipeline = match self.current {
                        RenderTarget::Display => &self.display_pipeline,
                        RenderTarget::Offscreen(_) => &self.linear_pipeline,
                    };
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(3, &self.environment.bind_group, &[]);
                    for (slot, item) in self.model_slots.iter().zip(&items) {
                        let Some(mesh) = self.meshes.get(&item.mesh.id()) else { continue };
                        let material_id = item.material.map_or(self.default_material.id(), |m| m.id());
                        let Some(material) = self.materials.get(&material_id) else { continue };
                        pass.set_bind_group(1, &material.bind_group, &[]);
                        pass.set_bind_group(2, &slot.bind_group, &[]);
                        pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                        pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                        pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                    }
                }
            }
        }
        self.submit(encoder);
        self.pending_clear = false;
    }

    fn render_compositor(&mut self, compositor: &mut Compositor) {
        let _span = debug_span!("render_compositor", target = ?self.current).entered();

        let format = self.target(self.current).format;
        let rebuild = compositor.take_rebuild();
        let stale = self
            .bokeh_pipeline
            .as_ref()
            .is_none_or(|p| p.format != format || p.quality != compositor.quality());
        if rebuild || stale {
            self.bokeh_pipeline = Some(create_bokeh_pipeline(
                &self.device,
                &self.bokeh_layout,
                format,
                compositor.quality(),
            ));
        }

        self.queue
            .write_buffer(&self.bokeh_buffer, 0, bytemuck::bytes_of(&compositor.uniforms));
        let quad = QuadUniform {
            mvp: (compositor.camera.view_proj_matrix() * compositor.quad_matrix()).to_cols_array_2d(),
        };
        self.queue.write_buffer(&self.quad_buffer, 0, bytemuck::bytes_of(&quad));

        if self.bokeh_bind_group.is_none() {
            self.bokeh_bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("bokeh_bind_group"),
                layout: &self.bokeh_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.bokeh_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&self.color.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&self.depth_target.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::Sampler(&self.bokeh_sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: self.quad_buffer.as_entire_binding(),
                    },
                ],
            }));
        }
        let (Some(pipeline), Some(bind_group)) = (&self.bokeh_pipeline, &self.bokeh_bind_group) else {
            return;
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("bokeh_encoder") });
        {
            let target = self.target(self.current);
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("bokeh_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: self.color_load_op(),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&pipeline.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
        self.submit(encoder);
        self.pending_clear = false;
    }
}

fn uniform_buffer(device: &wgpu::Device, label: &str, size: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn single_buffer_bind_group(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
    })
}
