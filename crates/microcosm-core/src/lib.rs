//! Microcosm Core Engine
//!
//! GPU-resident voxel protocell ecosystem: a double-buffered cellular
//! automaton with a diffusing temperature field, driven by five compute
//! dispatches per tick and deterministic across runs and platforms.

pub mod engine;
pub mod gpu;
pub mod layout;
pub mod presets;
pub mod rng;
pub mod shaders;
pub mod stats;

// Re-export main types
pub use engine::{Engine, EngineOptions, PickCamera, VoxelSnapshot};
pub use gpu::{CapabilityTier, EngineError, GpuContext};
pub use layout::{Command, Genome, Voxel, VoxelKind};
pub use presets::Preset;
pub use stats::StatsSnapshot;

// Re-export params from microcosm-params
pub use microcosm_params::*;
