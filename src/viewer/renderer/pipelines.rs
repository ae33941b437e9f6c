//! Scene rendering pipelines (physical material variants, depth override).

use physical_material::{BindGroupLayouts, OutputOptions, PipelineConfig};

use super::resources::DepthTexture;
use super::shaders::DEPTH_SHADER;

/// Physical material pipeline for one color target.
///
/// Offscreen color stays linear for the composite; the display variant
/// tone-maps in the shader.
pub fn create_scene_pipeline(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
    format: wgpu::TextureFormat,
    output: OutputOptions,
) -> wgpu::RenderPipeline {
    let config = PipelineConfig {
        label: Some(if output.tone_mapping {
            "scene_pipeline_display"
        } else {
            "scene_pipeline_linear"
        }),
        format,
        depth_format: Some(DepthTexture::FORMAT),
        cull_mode: Some(wgpu::Face::Back),
        output,
    };
    physical_material::create_pipeline(device, layouts, &config)
}

pub struct DepthPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub params_layout: wgpu::BindGroupLayout,
}

/// Pipeline for the depth override material. Shares the frame and model
/// layouts with the scene pipeline.
pub fn create_depth_pipeline(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
    format: wgpu::TextureFormat,
) -> DepthPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("depth_material_shader"),
        source: wgpu::ShaderSource::Wgsl(DEPTH_SHADER.into()),
    });
    let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("depth_material_params_layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("depth_material_pipeline_layout"),
        bind_group_layouts: &[&layouts.frame, &layouts.model, &params_layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("depth_material_pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_depth"),
            compilation_options: Default::default(),
            buffers: &[physical_material::vertex_buffer_layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_depth"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DepthTexture::FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    DepthPipeline {
        pipeline,
        params_layout,
    }
}
