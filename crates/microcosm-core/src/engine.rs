//! The engine: tick scheduling, command intake, parameter updates, stats and
//! pick readback. One instance owns every buffer and pipeline; the host
//! shell threads it through the frame loop.
//!
//! A tick is five sequential dispatches in one submission:
//! apply_commands (in place on the read buffer), temperature diffusion,
//! intent declaration, resolve-and-execute, stats reduction. The parity flip
//! afterwards is the only cross-tick synchronization.

use std::collections::VecDeque;

use glam::{Mat4, Vec3, Vec4};

use microcosm_params::{bindings, SimParams, SimulationConfig};

use crate::gpu::{
    AsyncSlot, CapabilityTier, EngineError, GpuContext, GridBuffers, GridGeometry, Layouts,
    Parity, PickRayRaw, PickResultRaw, Pipelines, PICK_RESULT_SIZE,
};
use crate::layout::command::serialize_commands;
use crate::layout::{Command, Voxel, MAX_COMMANDS, VOXEL_WORDS};
use crate::presets::Preset;
use crate::stats::{StatsRaw, StatsSnapshot, STATS_BUFFER_SIZE};

pub struct EngineOptions {
    pub config: SimulationConfig,
    /// Requested cubic grid edge; None picks the best tier for the device.
    pub requested_grid: Option<u32>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            config: SimulationConfig::default(),
            requested_grid: None,
        }
    }
}

/// Camera state the renderer hands over so picks can unproject screen
/// coordinates. The engine does no other camera math.
#[derive(Debug, Clone, Copy)]
pub struct PickCamera {
    pub inv_view_proj: Mat4,
    pub eye: Vec3,
}

/// One picked voxel, surfaced to the UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelSnapshot {
    pub coord: [u32; 3],
    pub voxel: Voxel,
    pub temperature: f32,
}

pub struct Engine {
    tier: CapabilityTier,
    params: SimParams,
    seed: u64,
    parity: Parity,
    pipelines: Pipelines,
    buffers: GridBuffers,

    pending: VecDeque<Command>,

    stats_slot: AsyncSlot,
    stats_inflight_tick: u32,
    latest_stats: Option<StatsSnapshot>,

    pick_slot: AsyncSlot,
    latest_pick: Option<VoxelSnapshot>,
    camera: Option<PickCamera>,

    paused: bool,
    step_queued: bool,
    tick_rate: u32,
    accumulator: f32,
}

impl Engine {
    pub async fn new(ctx: &GpuContext, options: EngineOptions) -> Result<Self, EngineError> {
        if let Err(drift) = bindings::validate_sim_params_size() {
            return Err(EngineError::PipelineCompile(drift));
        }
        bindings::log_binding_layouts();
        log::info!("{}", ctx.info());

        let mut tier = CapabilityTier::select(
            ctx.adapter.get_info().device_type,
            &ctx.adapter.limits(),
            options.requested_grid,
        );
        let layouts = Layouts::new(&ctx.device);
        let pipelines = Pipelines::new(&ctx.device, &layouts).await?;

        let (buffers, params) = loop {
            // sizes under the lowest tier bypass the tier table; they exist
            // for single-workgroup harnesses and scale experiments
            let geometry = match options.requested_grid {
                Some(g) if g < 64 => GridGeometry::dense(g.clamp(4, 64) & !3),
                _ => GridGeometry::for_tier(tier),
            };
            let mut params = SimParams::from_config(&options.config, geometry.grid_size);
            params.sparse_mode = geometry.sparse as u32;
            params.brick_grid_dim = geometry.brick_grid_dim;
            params.max_bricks = geometry.max_bricks;

            ctx.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
            let candidate =
                GridBuffers::allocate(&ctx.device, &ctx.queue, &layouts, geometry, &params);
            match ctx.device.pop_error_scope().await {
                None => break (candidate, params),
                Some(error) => {
                    log::warn!("allocation failed at {tier:?} ({error}); stepping down a tier");
                    match tier.next_lower() {
                        Some(lower) => tier = lower,
                        None => return Err(EngineError::AllocationFailed),
                    }
                }
            }
        };
        log::info!(
            "engine initialized: {:?} tier, {}^3 grid{}",
            tier,
            buffers.geometry.grid_size,
            if buffers.geometry.sparse { " (brick-sparse)" } else { "" },
        );

        let stats_slot = AsyncSlot::new(&ctx.device, "stats_staging", STATS_BUFFER_SIZE);
        let pick_slot = AsyncSlot::new(&ctx.device, "pick_staging", PICK_RESULT_SIZE);
        let tick_rate = options.config.world.tick_rate.clamp(1, 60);

        Ok(Self {
            tier,
            params,
            seed: options.config.world.seed,
            parity: Parity::default(),
            pipelines,
            buffers,
            pending: VecDeque::new(),
            stats_slot,
            stats_inflight_tick: 0,
            latest_stats: None,
            pick_slot,
            latest_pick: None,
            camera: None,
            paused: false,
            step_queued: false,
            tick_rate,
            accumulator: 0.0,
        })
    }

    pub fn tier(&self) -> CapabilityTier {
        self.tier
    }

    pub fn grid_size(&self) -> u32 {
        self.buffers.geometry.grid_size
    }

    pub fn tick_count(&self) -> u32 {
        self.parity.tick_count
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Queue a player command. Drained at up to 64 per tick; commands
    /// centered outside the grid are dropped here.
    pub fn queue_command(&mut self, command: Command) {
        if !command.in_grid(self.grid_size()) {
            log::warn!("dropping command centered outside the grid: {command:?}");
            return;
        }
        self.pending.push_back(command);
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        let grid = self.grid_size();
        for command in crate::presets::commands(preset, grid, self.seed) {
            self.queue_command(command);
        }
    }

    /// Change a live tunable. Takes effect at the next tick's uniform
    /// upload. Returns false for unknown names.
    pub fn set_param(&mut self, name: &str, value: f32) -> bool {
        self.params.set_by_name(name, value)
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Run exactly one tick at the next frame while paused.
    pub fn step(&mut self) {
        self.step_queued = true;
    }

    pub fn set_tick_rate(&mut self, rate: u32) {
        self.tick_rate = rate.clamp(1, 60);
    }

    /// Advance the simulation by wall time, at most 3 ticks per frame.
    pub fn frame(&mut self, ctx: &GpuContext, dt_seconds: f32) {
        if self.paused {
            if self.step_queued {
                self.step_queued = false;
                self.tick(ctx);
            }
            return;
        }
        self.accumulator = (self.accumulator + dt_seconds * self.tick_rate as f32).min(3.0);
        while self.accumulator >= 1.0 {
            self.accumulator -= 1.0;
            self.tick(ctx);
        }
    }

    /// One simulation tick: upload, clear, five dispatches, parity flip,
    /// stats kick.
    pub fn tick(&mut self, ctx: &GpuContext) {
        let batch: Vec<Command> = {
            let take = self.pending.len().min(MAX_COMMANDS);
            self.pending.drain(..take).collect()
        };

        {
            let GridBuffers {
                bricks,
                brick_table,
                geometry,
                ..
            } = &mut self.buffers;
            if let Some(bricks) = bricks.as_mut() {
                for command in &batch {
                    bricks.ensure_region(command.center(), command.radius(), geometry.grid_size);
                }
                bricks.upload_if_dirty(&ctx.queue, brick_table);
            }
        }

        let words = serialize_commands(&batch);
        ctx.queue
            .write_buffer(&self.buffers.commands, 0, bytemuck::cast_slice(&words));

        self.params.tick_count = self.parity.tick_count;
        ctx.queue
            .write_buffer(&self.buffers.params, 0, bytemuck::bytes_of(&self.params));

        let read = self.parity.read_slot();
        let active_bricks = self
            .buffers
            .bricks
            .as_ref()
            .map(|b| b.active_bricks())
            .unwrap_or(0);
        let (sx, sy, sz) = self.buffers.geometry.sim_dispatch(active_bricks);

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("tick_encoder"),
            });
        encoder.clear_buffer(&self.buffers.intents, 0, None);
        encoder.clear_buffer(&self.buffers.stats, 0, None);

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("apply_commands"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.apply_commands);
            pass.set_bind_group(0, &self.buffers.apply_commands_bg[read], &[]);
            pass.dispatch_workgroups(sx, sy, sz);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("temperature_diffusion"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.diffusion);
            pass.set_bind_group(0, &self.buffers.diffusion_bg[read], &[]);
            pass.dispatch_workgroups(sx, sy, sz);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("intent_declaration"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.intent);
            pass.set_bind_group(0, &self.buffers.intent_bg[read], &[]);
            pass.dispatch_workgroups(sx, sy, sz);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("resolve_and_execute"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.resolve);
            pass.set_bind_group(0, &self.buffers.resolve_bg[read], &[]);
            pass.dispatch_workgroups(sx, sy, sz);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("stats_reduction"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.stats);
            pass.set_bind_group(0, &self.buffers.stats_bg[read], &[]);
            pass.dispatch_workgroups(self.buffers.geometry.stats_dispatch(), 1, 1);
        }

        let kick_stats = self.stats_slot.is_idle();
        if kick_stats {
            self.stats_slot.encode_copy(&mut encoder, &self.buffers.stats);
        }
        ctx.queue.submit(std::iter::once(encoder.finish()));
        if kick_stats {
            self.stats_slot.request_map();
            self.stats_inflight_tick = self.parity.tick_count;
        }

        self.parity.advance();
    }

    /// Latest completed stats snapshot, if a readback finished since the
    /// last call. Never blocks.
    pub fn try_take_stats(&mut self, ctx: &GpuContext) -> Option<StatsSnapshot> {
        if let Some(bytes) = self.stats_slot.try_read(&ctx.device) {
            let raw: StatsRaw = bytemuck::pod_read_unaligned(&bytes);
            self.latest_stats = Some(StatsSnapshot::from_raw(self.stats_inflight_tick, &raw));
        }
        self.latest_stats.take()
    }

    // ---- consumer-facing buffer handles ----

    pub fn current_read_voxels(&self) -> &wgpu::Buffer {
        &self.buffers.voxels[self.parity.read_slot()]
    }

    pub fn current_read_temperatures(&self) -> &wgpu::Buffer {
        &self.buffers.temps[self.parity.read_slot()]
    }

    pub fn render_texture(&self) -> &wgpu::Texture {
        &self.buffers.render_texture
    }

    /// Repack the current read state into the 3D render texture. Outside the
    /// deterministic tick; call once per rendered frame.
    pub fn refresh_render_texture(&self, ctx: &GpuContext) {
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("render_blit_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("render_blit"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.render_blit);
            pass.set_bind_group(0, &self.buffers.render_blit_bg[self.parity.read_slot()], &[]);
            let w = self.grid_size() / 4;
            pass.dispatch_workgroups(w, w, w);
        }
        ctx.queue.submit(std::iter::once(encoder.finish()));
    }

    // ---- picking ----

    pub fn set_camera(&mut self, inv_view_proj: Mat4, eye: Vec3) {
        self.camera = Some(PickCamera { inv_view_proj, eye });
    }

    /// Unproject a screen position through the renderer-supplied camera and
    /// launch the pick kernel against the current read buffer.
    pub fn request_pick(&mut self, ctx: &GpuContext, x: f32, y: f32, screen_w: f32, screen_h: f32) {
        let Some(camera) = self.camera else {
            log::warn!("pick requested before any camera was set");
            return;
        };
        if !self.pick_slot.is_idle() {
            return;
        }
        let ndc_x = 2.0 * x / screen_w.max(1.0) - 1.0;
        let ndc_y = 1.0 - 2.0 * y / screen_h.max(1.0);
        let near = camera.inv_view_proj * Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
        let far = camera.inv_view_proj * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
        let near = near.truncate() / near.w;
        let far = far.truncate() / far.w;
        let dir = (far - near).normalize_or_zero();
        if dir == Vec3::ZERO {
            return;
        }
        let ray = PickRayRaw {
            origin: [camera.eye.x, camera.eye.y, camera.eye.z, 0.0],
            dir: [dir.x, dir.y, dir.z, 0.0],
        };
        ctx.queue
            .write_buffer(&self.buffers.pick_ray, 0, bytemuck::bytes_of(&ray));

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pick_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("pick"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipelines.pick);
            pass.set_bind_group(0, &self.buffers.pick_bg[self.parity.read_slot()], &[]);
            pass.dispatch_workgroups(1, 1, 1);
        }
        self.pick_slot.encode_copy(&mut encoder, &self.buffers.pick_result);
        ctx.queue.submit(std::iter::once(encoder.finish()));
        self.pick_slot.request_map();
    }

    pub fn take_pick_result(&mut self, ctx: &GpuContext) -> Option<VoxelSnapshot> {
        if let Some(bytes) = self.pick_slot.try_read(&ctx.device) {
            let raw: PickResultRaw = bytemuck::pod_read_unaligned(&bytes);
            if raw.hit != 0 {
                self.latest_pick = Some(VoxelSnapshot {
                    coord: [raw.x, raw.y, raw.z],
                    voxel: Voxel::unpack(raw.words),
                    temperature: raw.temperature,
                });
            }
        }
        self.latest_pick.take()
    }

    // ---- host-side state construction and inspection ----
    //
    // These pack and copy bytes through the layout authority; the ecology
    // itself only ever advances on the GPU.

    /// Write one voxel into the current read buffer, allocating its brick in
    /// sparse mode. The next tick sees it.
    pub fn write_voxel(&mut self, ctx: &GpuContext, cell: [u32; 3], voxel: &Voxel) {
        {
            let GridBuffers {
                bricks, brick_table, ..
            } = &mut self.buffers;
            if let Some(bricks) = bricks.as_mut() {
                bricks.ensure_cell(cell);
                bricks.upload_if_dirty(&ctx.queue, brick_table);
            }
        }
        let Some(slot) = self.buffers.cell_slot(cell) else {
            log::warn!("write_voxel outside the resident grid: {cell:?}");
            return;
        };
        let words = voxel.pack();
        ctx.queue.write_buffer(
            &self.buffers.voxels[self.parity.read_slot()],
            slot * VOXEL_WORDS as u64 * 4,
            bytemuck::cast_slice(&words),
        );
    }

    /// Read one voxel from the current read buffer. Blocking; meant for
    /// tests and tools, not the frame loop.
    pub fn read_voxel(&self, ctx: &GpuContext, cell: [u32; 3]) -> Option<Voxel> {
        let slot = self.buffers.cell_slot(cell)?;
        let bytes = read_buffer_blocking(
            ctx,
            self.current_read_voxels(),
            slot * VOXEL_WORDS as u64 * 4,
            VOXEL_WORDS as u64 * 4,
        );
        let words: [u32; VOXEL_WORDS] = bytemuck::pod_read_unaligned(&bytes);
        Some(Voxel::unpack(words))
    }

    /// Overwrite the whole temperature field (both parity slots). The slice
    /// length must match the storage slot count.
    pub fn write_temperatures(&self, ctx: &GpuContext, temps: &[f32]) -> bool {
        if temps.len() as u64 != self.buffers.geometry.total_slots() {
            return false;
        }
        ctx.queue
            .write_buffer(&self.buffers.temps[0], 0, bytemuck::cast_slice(temps));
        ctx.queue
            .write_buffer(&self.buffers.temps[1], 0, bytemuck::cast_slice(temps));
        true
    }

    /// Read the whole temperature field from the current read slot.
    /// Blocking; tests and tools only.
    pub fn read_temperatures(&self, ctx: &GpuContext) -> Vec<f32> {
        let bytes = read_buffer_blocking(
            ctx,
            self.current_read_temperatures(),
            0,
            self.buffers.geometry.scalar_buffer_size(),
        );
        bytemuck::pod_collect_to_vec(&bytes)
    }

    /// Read every voxel from the current read buffer in storage order.
    /// Blocking; tests and tools only.
    pub fn read_all_voxels(&self, ctx: &GpuContext) -> Vec<Voxel> {
        let bytes = read_buffer_blocking(
            ctx,
            self.current_read_voxels(),
            0,
            self.buffers.geometry.voxel_buffer_size(),
        );
        let words: Vec<u32> = bytemuck::pod_collect_to_vec(&bytes);
        words
            .chunks_exact(VOXEL_WORDS)
            .map(|chunk| {
                let mut w = [0u32; VOXEL_WORDS];
                w.copy_from_slice(chunk);
                Voxel::unpack(w)
            })
            .collect()
    }

    /// Read one Z slice in x-major order; None for cells whose bricks are
    /// unallocated. A single readback regardless of grid mode.
    pub fn read_voxel_slice(&self, ctx: &GpuContext, z: u32) -> Vec<Option<Voxel>> {
        let all = self.read_all_voxels(ctx);
        let g = self.buffers.geometry.grid_size;
        let mut out = Vec::with_capacity((g * g) as usize);
        for y in 0..g {
            for x in 0..g {
                out.push(
                    self.buffers
                        .cell_slot([x, y, z])
                        .map(|slot| all[slot as usize]),
                );
            }
        }
        out
    }

    /// FNV-1a checksum of the current read voxel buffer. Blocking; the
    /// determinism harness compares these across runs.
    pub fn voxel_checksum(&self, ctx: &GpuContext) -> u64 {
        let bytes = read_buffer_blocking(
            ctx,
            self.current_read_voxels(),
            0,
            self.buffers.geometry.voxel_buffer_size(),
        );
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for &b in &bytes {
            hash ^= b as u64;
            hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
        }
        hash
    }
}

fn read_buffer_blocking(
    ctx: &GpuContext,
    buffer: &wgpu::Buffer,
    offset: u64,
    size: u64,
) -> Vec<u8> {
    let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("blocking_readback"),
        size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("blocking_readback_encoder"),
        });
    encoder.copy_buffer_to_buffer(buffer, offset, &staging, 0, size);
    ctx.queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    ctx.device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .expect("map callback dropped")
        .expect("staging map failed");
    let bytes = slice.get_mapped_range().to_vec();
    staging.unmap();
    bytes
}
