use wgpu::{ComputePipeline, Device};

use super::device::EngineError;
use super::layouts::Layouts;
use crate::shaders;

/// Compute pipelines for the simulation. The five tick kernels plus the two
/// on-demand ones (pick, render blit).
pub struct Pipelines {
    pub apply_commands: ComputePipeline,
    pub diffusion: ComputePipeline,
    pub intent: ComputePipeline,
    pub resolve: ComputePipeline,
    pub stats: ComputePipeline,
    pub pick: ComputePipeline,
    pub render_blit: ComputePipeline,
}

impl Pipelines {
    /// Compile every kernel. A validation error here means the platform's
    /// shader compiler rejected the kernels, which the engine treats the
    /// same as an unsupported platform.
    pub async fn new(device: &Device, layouts: &Layouts) -> Result<Self, EngineError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let pipelines = Self {
            apply_commands: build(
                device,
                "apply_commands",
                &layouts.apply_commands,
                &shaders::apply_commands(),
            ),
            diffusion: build(
                device,
                "temperature_diffusion",
                &layouts.diffusion,
                &shaders::temperature_diffusion(),
            ),
            intent: build(
                device,
                "intent_declaration",
                &layouts.intent,
                &shaders::intent_declaration(),
            ),
            resolve: build(
                device,
                "resolve_and_execute",
                &layouts.resolve,
                &shaders::resolve_and_execute(),
            ),
            stats: build(device, "stats_reduction", &layouts.stats, &shaders::stats_reduction()),
            pick: build(device, "pick", &layouts.pick, &shaders::pick()),
            render_blit: build(
                device,
                "render_blit",
                &layouts.render_blit,
                &shaders::render_blit(),
            ),
        };

        if let Some(error) = device.pop_error_scope().await {
            return Err(EngineError::PipelineCompile(error.to_string()));
        }
        Ok(pipelines)
    }
}

fn build(
    device: &Device,
    name: &str,
    bgl: &wgpu::BindGroupLayout,
    source: &str,
) -> ComputePipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(name),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{name}_pl")),
        bind_group_layouts: &[bgl],
        push_constant_ranges: &[],
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(&format!("{name}_pipeline")),
        layout: Some(&layout),
        module: &module,
        entry_point: "main",
    })
}
