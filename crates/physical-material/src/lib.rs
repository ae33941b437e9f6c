//! Physical (metal/rough) material for wgpu
//!
//! Textured surface shader with image-based lighting from a prefiltered
//! equirectangular environment, linear fog, and a switchable output stage
//! (ACES filmic tone mapping + sRGB encoding).
//!
//! ## Usage
//!
//! ```ignore
//! use physical_material::{create_bind_group_layouts, create_pipeline, OutputOptions, PipelineConfig};
//!
//! let layouts = create_bind_group_layouts(&device);
//! let pipeline = create_pipeline(&device, &layouts, &PipelineConfig {
//!     format: surface_format,
//!     output: OutputOptions::display(surface_format),
//!     ..Default::default()
//! });
//! ```

mod params;

pub use params::{EnvUniform, FrameUniform, MaterialUniform, ModelUniform};

/// Embedded surface shader (without the output prelude)
pub const SHADER_SOURCE: &str = include_str!("shaders/physical.wgsl");

/// Output encoding library, shared with full-screen passes that write to the display
pub const OUTPUT_LIB: &str = include_str!("shaders/output.wgsl");

/// How a shader writes its final color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutputOptions {
    /// Apply ACES filmic tone mapping
    pub tone_mapping: bool,
    /// Encode linear color to sRGB in the shader (for non-sRGB targets)
    pub srgb_encode: bool,
}

impl OutputOptions {
    /// Linear HDR output for offscreen targets.
    pub const LINEAR: Self = Self {
        tone_mapping: false,
        srgb_encode: false,
    };

    /// Tone-mapped output for a display texture of the given format.
    pub fn display(format: wgpu::TextureFormat) -> Self {
        Self {
            tone_mapping: true,
            srgb_encode: !format.is_srgb(),
        }
    }

    /// WGSL constants consumed by [`OUTPUT_LIB`].
    pub fn prelude(&self) -> String {
        format!(
            "const TONE_MAPPING: bool = {};\nconst SRGB_OUTPUT: bool = {};\n",
            self.tone_mapping, self.srgb_encode
        )
    }
}

/// Full surface shader source for the given output options
pub fn shader_source(output: OutputOptions) -> String {
    let mut source = output.prelude();
    source.push_str(OUTPUT_LIB);
    source.push('\n');
    source.push_str(SHADER_SOURCE);
    source
}

/// Vertex buffer layout for standard mesh
pub fn vertex_buffer_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            // normal
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
            // uv
            wgpu::VertexAttribute {
                offset: 24,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    }
}

/// Standard vertex format
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Create bind group layouts for the physical material pipeline
pub fn create_bind_group_layouts(device: &wgpu::Device) -> BindGroupLayouts {
    // Group 0: camera + fog
    let frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("physical_material_frame"),
        entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT)],
    });

    // Group 1: material uniform, five maps, sampler
    let material = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("physical_material_material"),
        entries: &[
            uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
            texture_entry(1),
            texture_entry(2),
            texture_entry(3),
            texture_entry(4),
            texture_entry(5),
            sampler_entry(6),
        ],
    });

    // Group 2: model transform
    let model = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("physical_material_model"),
        entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
    });

    // Group 3: environment
    let environment = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("physical_material_environment"),
        entries: &[
            texture_entry(0),
            sampler_entry(1),
            uniform_entry(2, wgpu::ShaderStages::FRAGMENT),
        ],
    });

    BindGroupLayouts {
        frame,
        material,
        model,
        environment,
    }
}

/// Bind group layouts for the physical material
pub struct BindGroupLayouts {
    /// Group 0: camera + fog
    pub frame: wgpu::BindGroupLayout,
    /// Group 1: material parameters and maps
    pub material: wgpu::BindGroupLayout,
    /// Group 2: model transform
    pub model: wgpu::BindGroupLayout,
    /// Group 3: environment map
    pub environment: wgpu::BindGroupLayout,
}

/// Pipeline configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Debug label for the pipeline (defaults to "physical_material_pipeline")
    pub label: Option<&'static str>,
    /// Color target format
    pub format: wgpu::TextureFormat,
    /// Depth texture format (None to disable depth)
    pub depth_format: Option<wgpu::TextureFormat>,
    /// Cull mode
    pub cull_mode: Option<wgpu::Face>,
    /// Output stage
    pub output: OutputOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            label: None,
            format: wgpu::TextureFormat::Bgra8UnormSrgb,
            depth_format: Some(wgpu::TextureFormat::Depth32Float),
            cull_mode: Some(wgpu::Face::Back),
            output: OutputOptions::LINEAR,
        }
    }
}

/// Create the physical material render pipeline
pub fn create_pipeline(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
    config: &PipelineConfig,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("physical_material_shader"),
        source: wgpu::ShaderSource::Wgsl(shader_source(config.output).into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("physical_material_pipeline_layout"),
        bind_group_layouts: &[
            &layouts.frame,
            &layouts.material,
            &layouts.model,
            &layouts.environment,
        ],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(config.label.unwrap_or("physical_material_pipeline")),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[vertex_buffer_layout()],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: config.cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: config.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: config.format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}

/// Texture views bound to a material, in binding order
pub struct MaterialViews<'a> {
    pub map: &'a wgpu::TextureView,
    pub normal_map: &'a wgpu::TextureView,
    pub ao_map: &'a wgpu::TextureView,
    pub roughness_map: &'a wgpu::TextureView,
    pub metalness_map: &'a wgpu::TextureView,
}

/// Create a material uniform buffer
pub fn create_material_buffer(device: &wgpu::Device, params: &MaterialUniform) -> wgpu::Buffer {
    use wgpu::util::DeviceExt;
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("material_buffer"),
        contents: bytemuck::bytes_of(params),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

/// Create a material bind group
pub fn create_material_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    views: &MaterialViews<'_>,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("material_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(views.map),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(views.normal_map),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(views.ao_map),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::TextureView(views.roughness_map),
            },
            wgpu::BindGroupEntry {
                binding: 5,
                resource: wgpu::BindingResource::TextureView(views.metalness_map),
            },
            wgpu::BindGroupEntry {
                binding: 6,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Size and alignment tests ===

    #[test]
    fn test_frame_uniform_size() {
        assert_eq!(std::mem::size_of::<FrameUniform>(), 176);
        assert_eq!(std::mem::size_of::<FrameUniform>() % 16, 0);
    }

    #[test]
    fn test_model_uniform_size() {
        assert_eq!(std::mem::size_of::<ModelUniform>(), 128);
    }

    #[test]
    fn test_material_uniform_size() {
        assert_eq!(std::mem::size_of::<MaterialUniform>(), 48);
    }

    #[test]
    fn test_env_uniform_size() {
        assert_eq!(std::mem::size_of::<EnvUniform>(), 16);
    }

    #[test]
    fn test_vertex_size() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn test_model_uniform_normal_matrix() {
        let world = glam::Mat4::from_scale(glam::Vec3::new(2.0, 2.0, 2.0));
        let u = ModelUniform::from_world(world);
        assert_eq!(u.model[0][0], 2.0);
        assert!((u.normal_matrix[0][0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_fog_builder() {
        let u = FrameUniform::new(glam::Mat4::IDENTITY, glam::Mat4::IDENTITY, glam::Vec3::ZERO)
            .with_fog([0.1, 0.2, 0.3], 0.7, 17.0);
        assert_eq!(u.fog_color, [0.1, 0.2, 0.3]);
        assert_eq!(u.fog_near, 0.7);
        assert_eq!(u.fog_far, 17.0);
    }

    // === Shader source ===

    #[test]
    fn test_shader_entry_points() {
        assert!(SHADER_SOURCE.contains("fn vs_main"));
        assert!(SHADER_SOURCE.contains("fn fs_main"));
    }

    #[test]
    fn test_shader_bindings() {
        assert!(SHADER_SOURCE.contains("@group(0) @binding(0)"));
        assert!(SHADER_SOURCE.contains("@group(1) @binding(6)"));
        assert!(SHADER_SOURCE.contains("@group(2) @binding(0)"));
        assert!(SHADER_SOURCE.contains("@group(3) @binding(2)"));
    }

    #[test]
    fn test_output_prelude() {
        let linear = shader_source(OutputOptions::LINEAR);
        assert!(linear.starts_with("const TONE_MAPPING: bool = false;"));
        assert!(linear.contains("const SRGB_OUTPUT: bool = false;"));
        assert!(linear.contains("fn encode_output"));

        let display = OutputOptions::display(wgpu::TextureFormat::Bgra8Unorm);
        assert!(display.tone_mapping);
        assert!(display.srgb_encode);

        let srgb = OutputOptions::display(wgpu::TextureFormat::Bgra8UnormSrgb);
        assert!(!srgb.srgb_encode);
    }
}
