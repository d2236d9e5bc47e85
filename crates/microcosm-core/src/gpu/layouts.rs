use wgpu::{BindGroupLayout, Device};

/// Centralized registry that owns all bind group layouts.
///
/// Components that need layouts borrow them by reference when creating
/// pipelines and bind groups. The entry order in each layout is the kernel's
/// binding contract; see `microcosm_params::bindings`.
pub struct Layouts {
    pub apply_commands: BindGroupLayout,
    pub diffusion: BindGroupLayout,
    pub intent: BindGroupLayout,
    pub resolve: BindGroupLayout,
    pub stats: BindGroupLayout,
    pub pick: BindGroupLayout,
    pub render_blit: BindGroupLayout,
}

impl Layouts {
    pub fn new(device: &Device) -> Self {
        let apply_commands = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("apply_commands_bgl"),
            entries: &[
                storage_rw(0),
                storage_ro(1),
                uniform(2),
                storage_ro(3),
            ],
        });

        let diffusion = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("diffusion_bgl"),
            entries: &[
                storage_ro(0),
                storage_rw(1),
                storage_ro(2),
                uniform(3),
                storage_ro(4),
            ],
        });

        let intent = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("intent_bgl"),
            entries: &[
                storage_ro(0),
                storage_rw(1),
                uniform(2),
                storage_ro(3),
                storage_ro(4),
            ],
        });

        let resolve = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("resolve_bgl"),
            entries: &[
                storage_ro(0),
                storage_rw(1),
                uniform(2),
                storage_ro(3),
                storage_ro(4),
                storage_ro(5),
            ],
        });

        let stats = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("stats_bgl"),
            entries: &[storage_ro(0), storage_rw(1), uniform(2)],
        });

        let pick = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pick_bgl"),
            entries: &[
                storage_ro(0),
                storage_ro(1),
                uniform(2),
                uniform(3),
                storage_rw(4),
                storage_ro(5),
            ],
        });

        let render_blit = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("render_blit_bgl"),
            entries: &[
                storage_ro(0),
                storage_ro(1),
                uniform(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        view_dimension: wgpu::TextureViewDimension::D3,
                    },
                    count: None,
                },
                storage_ro(4),
            ],
        });

        Self {
            apply_commands,
            diffusion,
            intent,
            resolve,
            stats,
            pick,
            render_blit,
        }
    }
}

fn uniform(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_ro(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_rw(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
