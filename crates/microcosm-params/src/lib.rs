//! Shared parameter types for the microcosm protocell simulation
//!
//! This crate contains all parameter structures used by both the engine and
//! the headless runner to ensure consistency and prevent parameter drift.

use bytemuck::{Pod, Zeroable};

/// World configuration parameters
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorldConfig {
    /// Requested cubic grid edge; the engine may step down a capability tier.
    pub grid_size: u32,
    pub ticks: u32,
    /// Target tick rate in ticks per second, 1..=60.
    pub tick_rate: u32,
    pub seed: u64,
}

/// Ecology parameters governing protocell energetics
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EcologyConfig {
    pub nutrient_spawn_rate: f32,
    pub waste_decay_ticks: u32,
    pub nutrient_recycle_rate: f32,
    pub movement_energy_cost: f32,
    pub metabolic_cost_base: f32,
    pub replication_energy_min: f32,
    pub energy_from_nutrient: f32,
    pub energy_from_source: f32,
    pub predation_energy_fraction: f32,
    pub max_energy: u32,
}

/// Thermal field parameters
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThermalConfig {
    pub base_ambient_temp: f32,
    /// Discrete 6-neighbor diffusion is stable only up to 0.25.
    pub diffusion_rate: f32,
    pub temp_sensitivity: f32,
}

/// Complete simulation configuration
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    pub world: WorldConfig,
    pub ecology: EcologyConfig,
    pub thermal: ThermalConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            world: WorldConfig {
                grid_size: 128,
                ticks: 2000,
                tick_rate: 30,
                seed: 1337,
            },
            ecology: EcologyConfig {
                nutrient_spawn_rate: 0.002,
                waste_decay_ticks: 120,
                nutrient_recycle_rate: 0.35,
                movement_energy_cost: 2.0,
                metabolic_cost_base: 3.0,
                replication_energy_min: 120.0,
                energy_from_nutrient: 40.0,
                energy_from_source: 12.0,
                predation_energy_fraction: 0.6,
                max_energy: 60000,
            },
            thermal: ThermalConfig {
                base_ambient_temp: 0.5,
                diffusion_rate: 0.12,
                temp_sensitivity: 0.8,
            },
        }
    }
}

/// GPU-compatible uniform block shared by every simulation kernel.
///
/// Field order and types must match the `Params` struct in the WGSL prelude
/// word for word. 80 bytes, no implicit padding.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SimParams {
    pub grid_size: u32,
    pub tick_count: u32,
    pub sparse_mode: u32,
    pub brick_grid_dim: u32,

    pub max_bricks: u32,
    pub waste_decay_ticks: u32,
    pub overlay_mode: u32,
    pub max_energy: u32,

    pub dt: f32,
    pub nutrient_spawn_rate: f32,
    pub nutrient_recycle_rate: f32,
    pub movement_energy_cost: f32,

    pub base_ambient_temp: f32,
    pub metabolic_cost_base: f32,
    pub replication_energy_min: f32,
    pub energy_from_nutrient: f32,

    pub energy_from_source: f32,
    pub diffusion_rate: f32,
    pub temp_sensitivity: f32,
    pub predation_energy_fraction: f32,
}

impl SimParams {
    /// Build the uniform block for a resolved grid. Sparse fields are zeroed
    /// here; the buffer fabric fills them in when the sparse tier is active.
    pub fn from_config(config: &SimulationConfig, grid_size: u32) -> Self {
        let mut params = Self {
            grid_size,
            tick_count: 0,
            sparse_mode: 0,
            brick_grid_dim: 0,
            max_bricks: 0,
            waste_decay_ticks: config.ecology.waste_decay_ticks,
            overlay_mode: 0,
            max_energy: config.ecology.max_energy.min(65535),
            dt: 1.0 / config.world.tick_rate.clamp(1, 60) as f32,
            nutrient_spawn_rate: config.ecology.nutrient_spawn_rate,
            nutrient_recycle_rate: config.ecology.nutrient_recycle_rate,
            movement_energy_cost: config.ecology.movement_energy_cost,
            base_ambient_temp: config.thermal.base_ambient_temp,
            metabolic_cost_base: config.ecology.metabolic_cost_base,
            replication_energy_min: config.ecology.replication_energy_min,
            energy_from_nutrient: config.ecology.energy_from_nutrient,
            energy_from_source: config.ecology.energy_from_source,
            diffusion_rate: config.thermal.diffusion_rate,
            temp_sensitivity: config.thermal.temp_sensitivity,
            predation_energy_fraction: config.ecology.predation_energy_fraction,
        };
        params.clamp_ranges();
        params
    }

    /// Clamp every bounded field into its stable range. Out-of-range values
    /// are a correctness hazard (diffusion blowup, negative energy), not an
    /// error, so they are silently pulled back.
    pub fn clamp_ranges(&mut self) {
        self.nutrient_spawn_rate = self.nutrient_spawn_rate.clamp(0.0, 1.0);
        self.nutrient_recycle_rate = self.nutrient_recycle_rate.clamp(0.0, 1.0);
        self.predation_energy_fraction = self.predation_energy_fraction.clamp(0.0, 1.0);
        self.diffusion_rate = self.diffusion_rate.clamp(0.0, 0.25);
        self.temp_sensitivity = self.temp_sensitivity.clamp(0.0, 2.0);
        self.base_ambient_temp = self.base_ambient_temp.clamp(0.0, 1.0);
        self.movement_energy_cost = self.movement_energy_cost.max(0.0);
        self.metabolic_cost_base = self.metabolic_cost_base.max(0.0);
        self.replication_energy_min = self.replication_energy_min.max(0.0);
        self.energy_from_nutrient = self.energy_from_nutrient.max(0.0);
        self.energy_from_source = self.energy_from_source.max(0.0);
        self.max_energy = self.max_energy.min(65535);
    }

    /// Set a tunable by name, clamping into range. Returns false for names
    /// that are not live tunables (grid geometry is fixed at startup).
    pub fn set_by_name(&mut self, name: &str, value: f32) -> bool {
        match name {
            "dt" => self.dt = value,
            "nutrient_spawn_rate" => self.nutrient_spawn_rate = value,
            "waste_decay_ticks" => self.waste_decay_ticks = value.max(0.0) as u32,
            "nutrient_recycle_rate" => self.nutrient_recycle_rate = value,
            "movement_energy_cost" => self.movement_energy_cost = value,
            "base_ambient_temp" => self.base_ambient_temp = value,
            "metabolic_cost_base" => self.metabolic_cost_base = value,
            "replication_energy_min" => self.replication_energy_min = value,
            "energy_from_nutrient" => self.energy_from_nutrient = value,
            "energy_from_source" => self.energy_from_source = value,
            "diffusion_rate" => self.diffusion_rate = value,
            "temp_sensitivity" => self.temp_sensitivity = value,
            "predation_energy_fraction" => self.predation_energy_fraction = value,
            "max_energy" => self.max_energy = value.max(0.0) as u32,
            "overlay_mode" => self.overlay_mode = value.max(0.0) as u32,
            _ => return false,
        }
        self.clamp_ranges();
        true
    }
}

/// WGSL binding layout documentation and validation
///
/// This module documents the exact binding contracts each kernel is compiled
/// against. The engine and any external consumer must agree on these indices.
pub mod bindings {
    use super::*;

    /// `apply_commands` bindings (group 0)
    ///
    /// ```wgsl
    /// @group(0) @binding(0) var<storage, read_write> voxels: array<u32>;
    /// @group(0) @binding(1) var<storage, read> commands: array<u32>;
    /// @group(0) @binding(2) var<uniform> params: Params;
    /// @group(0) @binding(3) var<storage, read> brick_table: array<u32>;
    /// ```
    pub const APPLY_COMMANDS_BINDINGS: &str =
        "apply_commands group 0: voxels(rw), commands(r), Params(uniform), brick_table(r)";

    /// `temperature_diffusion` bindings (group 0)
    ///
    /// ```wgsl
    /// @group(0) @binding(0) var<storage, read> temp_in: array<f32>;
    /// @group(0) @binding(1) var<storage, read_write> temp_out: array<f32>;
    /// @group(0) @binding(2) var<storage, read> voxels: array<u32>;
    /// @group(0) @binding(3) var<uniform> params: Params;
    /// @group(0) @binding(4) var<storage, read> brick_table: array<u32>;
    /// ```
    pub const DIFFUSION_BINDINGS: &str =
        "temperature_diffusion group 0: temp_in(r), temp_out(rw), voxels(r), Params(uniform), brick_table(r)";

    /// `intent_declaration` bindings (group 0)
    ///
    /// ```wgsl
    /// @group(0) @binding(0) var<storage, read> voxels: array<u32>;
    /// @group(0) @binding(1) var<storage, read_write> intents: array<u32>;
    /// @group(0) @binding(2) var<uniform> params: Params;
    /// @group(0) @binding(3) var<storage, read> temps: array<f32>;
    /// @group(0) @binding(4) var<storage, read> brick_table: array<u32>;
    /// ```
    pub const INTENT_BINDINGS: &str =
        "intent_declaration group 0: voxels(r), intents(rw), Params(uniform), temps(r), brick_table(r)";

    /// `resolve_and_execute` bindings (group 0)
    ///
    /// ```wgsl
    /// @group(0) @binding(0) var<storage, read> voxels_in: array<u32>;
    /// @group(0) @binding(1) var<storage, read_write> voxels_out: array<u32>;
    /// @group(0) @binding(2) var<uniform> params: Params;
    /// @group(0) @binding(3) var<storage, read> intents: array<u32>;
    /// @group(0) @binding(4) var<storage, read> temps: array<f32>;
    /// @group(0) @binding(5) var<storage, read> brick_table: array<u32>;
    /// ```
    pub const RESOLVE_BINDINGS: &str =
        "resolve_and_execute group 0: voxels_in(r), voxels_out(rw), Params(uniform), intents(r), temps(r), brick_table(r)";

    /// `stats_reduction` bindings (group 0)
    ///
    /// ```wgsl
    /// @group(0) @binding(0) var<storage, read> voxels: array<u32>;
    /// @group(0) @binding(1) var<storage, read_write> stats: Stats;
    /// @group(0) @binding(2) var<uniform> params: Params;
    /// ```
    pub const STATS_BINDINGS: &str =
        "stats_reduction group 0: voxels(r), stats(rw atomic), Params(uniform)";

    /// Uniform block size the WGSL prelude declares. A mismatch here means
    /// the Rust struct and the shader have drifted apart.
    pub const SIM_PARAMS_SIZE: usize = 80;

    /// Validate that the uniform block still matches the shader-side layout.
    pub fn validate_sim_params_size() -> Result<(), String> {
        let actual = std::mem::size_of::<SimParams>();
        if actual != SIM_PARAMS_SIZE {
            Err(format!(
                "SimParams size mismatch: expected {}, got {}",
                SIM_PARAMS_SIZE, actual
            ))
        } else {
            Ok(())
        }
    }

    /// Log binding layout information for debugging
    pub fn log_binding_layouts() {
        log::info!("{}", APPLY_COMMANDS_BINDINGS);
        log::info!("{}", DIFFUSION_BINDINGS);
        log::info!("{}", INTENT_BINDINGS);
        log::info!("{}", RESOLVE_BINDINGS);
        log::info!("{}", STATS_BINDINGS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_block_is_80_bytes() {
        bindings::validate_sim_params_size().unwrap();
    }

    #[test]
    fn clamping_pulls_rates_into_range() {
        let mut p = SimParams::from_config(&SimulationConfig::default(), 64);
        p.diffusion_rate = 3.0;
        p.nutrient_spawn_rate = -1.0;
        p.temp_sensitivity = 100.0;
        p.clamp_ranges();
        assert_eq!(p.diffusion_rate, 0.25);
        assert_eq!(p.nutrient_spawn_rate, 0.0);
        assert_eq!(p.temp_sensitivity, 2.0);
    }

    #[test]
    fn set_by_name_rejects_unknown_and_clamps_known() {
        let mut p = SimParams::from_config(&SimulationConfig::default(), 64);
        assert!(!p.set_by_name("grid_size", 256.0));
        assert!(p.set_by_name("diffusion_rate", 0.9));
        assert_eq!(p.diffusion_rate, 0.25);
    }
}
