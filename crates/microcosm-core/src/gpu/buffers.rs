//! Buffer fabric: every grid-sized allocation, the double-buffer parity
//! record, and the prebuilt per-parity bind groups.
//!
//! All buffers are allocated once at startup and never freed mid-run. On
//! tick n the read set is parity slot `n % 2` and the write set is the
//! opposite slot; the parity is derived from the tick count rather than a
//! mutable "current" pointer so the two can never drift apart.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;
use wgpu::{BindGroup, Buffer, Device, Queue, Texture, TextureView};

use microcosm_params::SimParams;

use super::device::CapabilityTier;
use super::layouts::Layouts;
use crate::layout::command::COMMAND_BUFFER_WORDS;
use crate::layout::VOXEL_WORDS;
use crate::stats::STATS_BUFFER_SIZE;

pub const INVALID_SLOT: u32 = u32::MAX;
pub const BRICK_EDGE: u32 = 8;
pub const BRICK_VOXELS: u32 = 512;

/// Ray uniform for the pick kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PickRayRaw {
    pub origin: [f32; 4],
    pub dir: [f32; 4],
}

/// Pick kernel output, mirrored from the WGSL `PickResult` struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PickResultRaw {
    pub hit: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub words: [u32; 8],
    pub temperature: f32,
    pub _pad: [f32; 3],
}

pub const PICK_RESULT_SIZE: u64 = std::mem::size_of::<PickResultRaw>() as u64;

/// Double-buffer parity, derived from the tick count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Parity {
    pub tick_count: u32,
}

impl Parity {
    pub fn read_slot(self) -> usize {
        (self.tick_count % 2) as usize
    }

    pub fn write_slot(self) -> usize {
        1 - self.read_slot()
    }

    pub fn advance(&mut self) {
        self.tick_count = self.tick_count.wrapping_add(1);
    }
}

/// Resolved grid shape for a capability tier.
#[derive(Debug, Clone, Copy)]
pub struct GridGeometry {
    pub grid_size: u32,
    pub sparse: bool,
    pub brick_grid_dim: u32,
    pub max_bricks: u32,
}

impl GridGeometry {
    pub fn for_tier(tier: CapabilityTier) -> Self {
        let grid_size = tier.grid_size();
        if tier.is_sparse() {
            Self {
                grid_size,
                sparse: true,
                brick_grid_dim: grid_size / BRICK_EDGE,
                max_bricks: 4096,
            }
        } else {
            Self::dense(grid_size)
        }
    }

    /// Dense geometry at an arbitrary edge length (multiple of the 4-wide
    /// workgroup). Below-tier sizes exist for harnesses that need a single
    /// workgroup or a handful of them.
    pub fn dense(grid_size: u32) -> Self {
        debug_assert!(grid_size >= 4 && grid_size % 4 == 0);
        Self {
            grid_size,
            sparse: false,
            brick_grid_dim: 0,
            max_bricks: 0,
        }
    }

    /// Storage slots per grid-sized buffer: the dense cell count, or the
    /// whole brick pool in sparse mode.
    pub fn total_slots(&self) -> u64 {
        if self.sparse {
            self.max_bricks as u64 * BRICK_VOXELS as u64
        } else {
            let g = self.grid_size as u64;
            g * g * g
        }
    }

    pub fn voxel_buffer_size(&self) -> u64 {
        self.total_slots() * VOXEL_WORDS as u64 * 4
    }

    pub fn scalar_buffer_size(&self) -> u64 {
        self.total_slots() * 4
    }

    pub fn brick_table_words(&self) -> u64 {
        if self.sparse {
            let d = self.brick_grid_dim as u64;
            d * d * d + self.max_bricks as u64
        } else {
            1
        }
    }

    /// Workgroup counts for the grid-iterating kernels.
    pub fn sim_dispatch(&self, active_bricks: u32) -> (u32, u32, u32) {
        if self.sparse {
            (active_bricks * 8, 1, 1)
        } else {
            let w = self.grid_size / 4;
            (w, w, w)
        }
    }

    /// Workgroup count for the slot-linear stats reduction.
    pub fn stats_dispatch(&self) -> u32 {
        (self.total_slots() as u32 + 63) / 64
    }
}

/// Host mirror of the sparse brick table: a bucket grid mapping brick
/// coordinates to pool slots, plus the reverse origin list the kernels use
/// to iterate allocated bricks. Bricks are never freed.
pub struct BrickDirectory {
    dim: u32,
    max_bricks: u32,
    buckets: Vec<u32>,
    origins: Vec<u32>,
    active: u32,
    dirty: bool,
    exhausted_logged: bool,
}

impl BrickDirectory {
    pub fn new(geometry: &GridGeometry) -> Self {
        let d = geometry.brick_grid_dim as usize;
        Self {
            dim: geometry.brick_grid_dim,
            max_bricks: geometry.max_bricks,
            buckets: vec![INVALID_SLOT; d * d * d],
            origins: vec![0; geometry.max_bricks as usize],
            active: 0,
            dirty: true,
            exhausted_logged: false,
        }
    }

    pub fn active_bricks(&self) -> u32 {
        self.active
    }

    fn bucket_index(&self, brick: [u32; 3]) -> usize {
        (brick[0] + brick[1] * self.dim + brick[2] * self.dim * self.dim) as usize
    }

    /// Allocate the brick containing `cell` if it is not resident yet.
    pub fn ensure_cell(&mut self, cell: [u32; 3]) {
        let brick = [
            cell[0] / BRICK_EDGE,
            cell[1] / BRICK_EDGE,
            cell[2] / BRICK_EDGE,
        ];
        if brick.iter().any(|&b| b >= self.dim) {
            return;
        }
        let bucket = self.bucket_index(brick);
        if self.buckets[bucket] != INVALID_SLOT {
            return;
        }
        if self.active >= self.max_bricks {
            if !self.exhausted_logged {
                log::warn!(
                    "brick pool exhausted ({} bricks); further allocations dropped",
                    self.max_bricks
                );
                self.exhausted_logged = true;
            }
            return;
        }
        let slot = self.active;
        self.buckets[bucket] = slot;
        self.origins[slot as usize] = bucket as u32;
        self.active += 1;
        self.dirty = true;
    }

    /// Allocate every brick overlapping a cubic brush. Scan order is fixed,
    /// so the pool layout is deterministic for a given command history.
    pub fn ensure_region(&mut self, center: [u32; 3], radius: u32, grid_size: u32) {
        let lo: Vec<u32> = center.iter().map(|&c| c.saturating_sub(radius)).collect();
        let hi: Vec<u32> = center
            .iter()
            .map(|&c| (c + radius).min(grid_size - 1))
            .collect();
        let mut z = lo[2];
        while z <= hi[2] {
            let mut y = lo[1];
            while y <= hi[1] {
                let mut x = lo[0];
                while x <= hi[0] {
                    self.ensure_cell([x, y, z]);
                    x = (x / BRICK_EDGE + 1) * BRICK_EDGE;
                }
                y = (y / BRICK_EDGE + 1) * BRICK_EDGE;
            }
            z = (z / BRICK_EDGE + 1) * BRICK_EDGE;
        }
    }

    /// Push the table to the GPU if it changed.
    pub fn upload_if_dirty(&mut self, queue: &Queue, buffer: &Buffer) {
        if !self.dirty {
            return;
        }
        let mut words = Vec::with_capacity(self.buckets.len() + self.origins.len());
        words.extend_from_slice(&self.buckets);
        words.extend_from_slice(&self.origins);
        queue.write_buffer(buffer, 0, bytemuck::cast_slice(&words));
        self.dirty = false;
    }
}

/// All GPU-resident state for one engine instance.
pub struct GridBuffers {
    pub geometry: GridGeometry,
    pub voxels: [Buffer; 2],
    pub temps: [Buffer; 2],
    pub intents: Buffer,
    pub commands: Buffer,
    pub params: Buffer,
    pub stats: Buffer,
    pub pick_ray: Buffer,
    pub pick_result: Buffer,
    pub brick_table: Buffer,
    pub render_texture: Texture,
    pub render_view: TextureView,
    pub bricks: Option<BrickDirectory>,

    // prebuilt per-parity bind groups, indexed by Parity::read_slot()
    pub apply_commands_bg: [BindGroup; 2],
    pub diffusion_bg: [BindGroup; 2],
    pub intent_bg: [BindGroup; 2],
    pub resolve_bg: [BindGroup; 2],
    pub stats_bg: [BindGroup; 2],
    pub pick_bg: [BindGroup; 2],
    pub render_blit_bg: [BindGroup; 2],
}

impl GridBuffers {
    pub fn allocate(
        device: &Device,
        queue: &Queue,
        layouts: &Layouts,
        geometry: GridGeometry,
        params: &SimParams,
    ) -> Self {
        let storage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;

        let voxels = [
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("voxels_a"),
                size: geometry.voxel_buffer_size(),
                usage: storage,
                mapped_at_creation: false,
            }),
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("voxels_b"),
                size: geometry.voxel_buffer_size(),
                usage: storage,
                mapped_at_creation: false,
            }),
        ];
        let temps = [
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("temps_a"),
                size: geometry.scalar_buffer_size(),
                usage: storage,
                mapped_at_creation: false,
            }),
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("temps_b"),
                size: geometry.scalar_buffer_size(),
                usage: storage,
                mapped_at_creation: false,
            }),
        ];
        let intents = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("intents"),
            size: geometry.scalar_buffer_size(),
            usage: storage,
            mapped_at_creation: false,
        });
        let commands = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("commands"),
            size: (COMMAND_BUFFER_WORDS * 4) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sim_params"),
            contents: bytemuck::bytes_of(params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let stats = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("stats"),
            size: STATS_BUFFER_SIZE,
            usage: storage,
            mapped_at_creation: false,
        });
        let pick_ray = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pick_ray"),
            size: std::mem::size_of::<PickRayRaw>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let pick_result = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pick_result"),
            size: PICK_RESULT_SIZE,
            usage: storage,
            mapped_at_creation: false,
        });

        let bricks = geometry.sparse.then(|| BrickDirectory::new(&geometry));
        let brick_table = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("brick_table"),
            size: geometry.brick_table_words() * 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let render_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render_volume"),
            size: wgpu::Extent3d {
                width: geometry.grid_size,
                height: geometry.grid_size,
                depth_or_array_layers: geometry.grid_size,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let render_view = render_texture.create_view(&wgpu::TextureViewDescriptor::default());

        // the temperature field starts at ambient in both parity slots
        let ambient = vec![params.base_ambient_temp; geometry.total_slots() as usize];
        queue.write_buffer(&temps[0], 0, bytemuck::cast_slice(&ambient));
        queue.write_buffer(&temps[1], 0, bytemuck::cast_slice(&ambient));

        let mut apply_commands_bg = Vec::with_capacity(2);
        let mut diffusion_bg = Vec::with_capacity(2);
        let mut intent_bg = Vec::with_capacity(2);
        let mut resolve_bg = Vec::with_capacity(2);
        let mut stats_bg = Vec::with_capacity(2);
        let mut pick_bg = Vec::with_capacity(2);
        let mut render_blit_bg = Vec::with_capacity(2);
        for read in 0..2usize {
            let write = 1 - read;
            apply_commands_bg.push(bind_group(device,
                "apply_commands_bg",
                &layouts.apply_commands,
                &[
                    buffer_entry(0, &voxels[read]),
                    buffer_entry(1, &commands),
                    buffer_entry(2, &params_buffer),
                    buffer_entry(3, &brick_table),
                ],
            ));
            diffusion_bg.push(bind_group(device,
                "diffusion_bg",
                &layouts.diffusion,
                &[
                    buffer_entry(0, &temps[read]),
                    buffer_entry(1, &temps[write]),
                    buffer_entry(2, &voxels[read]),
                    buffer_entry(3, &params_buffer),
                    buffer_entry(4, &brick_table),
                ],
            ));
            intent_bg.push(bind_group(device,
                "intent_bg",
                &layouts.intent,
                &[
                    buffer_entry(0, &voxels[read]),
                    buffer_entry(1, &intents),
                    buffer_entry(2, &params_buffer),
                    buffer_entry(3, &temps[write]),
                    buffer_entry(4, &brick_table),
                ],
            ));
            resolve_bg.push(bind_group(device,
                "resolve_bg",
                &layouts.resolve,
                &[
                    buffer_entry(0, &voxels[read]),
                    buffer_entry(1, &voxels[write]),
                    buffer_entry(2, &params_buffer),
                    buffer_entry(3, &intents),
                    buffer_entry(4, &temps[write]),
                    buffer_entry(5, &brick_table),
                ],
            ));
            stats_bg.push(bind_group(device,
                "stats_bg",
                &layouts.stats,
                &[
                    buffer_entry(0, &voxels[write]),
                    buffer_entry(1, &stats),
                    buffer_entry(2, &params_buffer),
                ],
            ));
            pick_bg.push(bind_group(device,
                "pick_bg",
                &layouts.pick,
                &[
                    buffer_entry(0, &voxels[read]),
                    buffer_entry(1, &temps[read]),
                    buffer_entry(2, &params_buffer),
                    buffer_entry(3, &pick_ray),
                    buffer_entry(4, &pick_result),
                    buffer_entry(5, &brick_table),
                ],
            ));
            render_blit_bg.push(bind_group(device,
                "render_blit_bg",
                &layouts.render_blit,
                &[
                    buffer_entry(0, &voxels[read]),
                    buffer_entry(1, &temps[read]),
                    buffer_entry(2, &params_buffer),
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&render_view),
                    },
                    buffer_entry(4, &brick_table),
                ],
            ));
        }
        let into_pair = |mut v: Vec<BindGroup>| {
            let b = v.pop().unwrap();
            let a = v.pop().unwrap();
            [a, b]
        };

        Self {
            geometry,
            voxels,
            temps,
            intents,
            commands,
            params: params_buffer,
            stats,
            pick_ray,
            pick_result,
            brick_table,
            render_texture,
            render_view,
            bricks,
            apply_commands_bg: into_pair(apply_commands_bg),
            diffusion_bg: into_pair(diffusion_bg),
            intent_bg: into_pair(intent_bg),
            resolve_bg: into_pair(resolve_bg),
            stats_bg: into_pair(stats_bg),
            pick_bg: into_pair(pick_bg),
            render_blit_bg: into_pair(render_blit_bg),
        }
    }

    /// Linear storage slot for a cell, or None while its brick is
    /// unallocated. Mirrors the WGSL `cell_slot` helper.
    pub fn cell_slot(&self, cell: [u32; 3]) -> Option<u64> {
        let g = self.geometry.grid_size;
        if cell.iter().any(|&c| c >= g) {
            return None;
        }
        if !self.geometry.sparse {
            return Some(
                cell[0] as u64 + cell[1] as u64 * g as u64 + cell[2] as u64 * g as u64 * g as u64,
            );
        }
        let bricks = self.bricks.as_ref()?;
        let dim = self.geometry.brick_grid_dim;
        let b = [
            cell[0] / BRICK_EDGE,
            cell[1] / BRICK_EDGE,
            cell[2] / BRICK_EDGE,
        ];
        let bucket = (b[0] + b[1] * dim + b[2] * dim * dim) as usize;
        let pool = bricks.buckets[bucket];
        if pool == INVALID_SLOT {
            return None;
        }
        let l = [
            cell[0] % BRICK_EDGE,
            cell[1] % BRICK_EDGE,
            cell[2] % BRICK_EDGE,
        ];
        Some(
            pool as u64 * BRICK_VOXELS as u64
                + (l[0] + l[1] * BRICK_EDGE + l[2] * BRICK_EDGE * BRICK_EDGE) as u64,
        )
    }
}

fn bind_group(
    device: &Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    entries: &[wgpu::BindGroupEntry],
) -> BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries,
    })
}

fn buffer_entry(binding: u32, buffer: &Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_alternates_with_ticks() {
        let mut p = Parity::default();
        assert_eq!(p.read_slot(), 0);
        assert_eq!(p.write_slot(), 1);
        p.advance();
        assert_eq!(p.read_slot(), 1);
        assert_eq!(p.write_slot(), 0);
    }

    #[test]
    fn sparse_geometry_counts_pool_slots() {
        let g = GridGeometry::for_tier(CapabilityTier::Sparse);
        assert_eq!(g.brick_grid_dim, 32);
        assert_eq!(g.total_slots(), 4096 * 512);
        let d = GridGeometry::for_tier(CapabilityTier::DenseLow);
        assert_eq!(d.total_slots(), 64 * 64 * 64);
    }

    #[test]
    fn brick_allocation_is_deterministic_and_capped() {
        let geometry = GridGeometry::for_tier(CapabilityTier::Sparse);
        let mut a = BrickDirectory::new(&geometry);
        let mut b = BrickDirectory::new(&geometry);
        a.ensure_region([128, 128, 128], 12, 256);
        b.ensure_region([128, 128, 128], 12, 256);
        assert_eq!(a.active_bricks(), b.active_bricks());
        assert_eq!(a.buckets, b.buckets);
        assert!(a.active_bricks() > 0);
    }
}
