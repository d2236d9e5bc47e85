//! Data-layout authority.
//!
//! The single source of truth for the packed voxel, intent, and command
//! binary formats shared between host-side state construction and the WGSL
//! kernels. Every bit position below is mirrored verbatim in the shader
//! prelude; a change to either side invalidates both simultaneously.

pub mod command;
pub mod intent;
pub mod voxel;

pub use command::{Command, CommandRecord, COMMAND_WORDS, MAX_COMMANDS};
pub use intent::{decode_intent, encode_intent, Action, Direction};
pub use voxel::{gene, Genome, Voxel, VoxelKind, GENOME_LEN, VOXEL_WORDS};

/// Default nutrient concentration: spawns, recycling, zero-parameter
/// PlaceVoxel commands, and host-side nutrient construction (presets,
/// harnesses) all use this value. `NUTRIENT_DEFAULT` in the WGSL prelude is
/// its shader mirror.
pub const NUTRIENT_DEFAULT_CONCENTRATION: u32 = 8;

/// Default starting energy for placed and seeded protocells. Presets seed
/// with it; `PROTOCELL_PLACE_ENERGY` in the WGSL prelude is its shader
/// mirror for the zero-parameter PlaceVoxel path.
pub const PROTOCELL_DEFAULT_ENERGY: u32 = 250;
