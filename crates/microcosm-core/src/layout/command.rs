//! Player command wire format.
//!
//! The command buffer is a 4-byte inline count followed by up to 64 fixed
//! 64-byte records: `[type, x, y, z, radius, param0, param1]` + padding.
//! Brushes are cubic (Chebyshev distance). Unknown types are no-ops.

use bytemuck::{Pod, Zeroable};

use super::voxel::VoxelKind;

pub const MAX_COMMANDS: usize = 64;
/// 64-byte record = 16 words.
pub const COMMAND_WORDS: usize = 16;
/// Whole buffer in words: inline count + records.
pub const COMMAND_BUFFER_WORDS: usize = 1 + MAX_COMMANDS * COMMAND_WORDS;

pub const CMD_PLACE_VOXEL: u32 = 0;
pub const CMD_REMOVE_VOXEL: u32 = 1;
pub const CMD_SEED_PROTOCELLS: u32 = 2;
pub const CMD_APPLY_TOXIN: u32 = 3;

/// Wire record, exactly 64 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CommandRecord {
    pub command_type: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub radius: u32,
    pub param0: u32,
    pub param1: u32,
    pub _pad: [u32; 9],
}

/// Host-side command, the richer form players and presets produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Fill the brush with voxels of the given kind. `extra` seeds the
    /// type-specific state word (nutrient concentration, emission rate);
    /// zero means the type default.
    PlaceVoxel {
        center: [u32; 3],
        radius: u32,
        kind: VoxelKind,
        extra: u32,
    },
    /// Clear the brush back to Empty.
    RemoveVoxel { center: [u32; 3], radius: u32 },
    /// Populate Empty voxels in the brush with randomized protocells at the
    /// given starting energy.
    SeedProtocells {
        center: [u32; 3],
        radius: u32,
        energy: u32,
    },
    /// Turn protocells with toxin resistance below `threshold` into waste.
    ApplyToxin {
        center: [u32; 3],
        radius: u32,
        threshold: u32,
    },
}

impl Command {
    pub fn to_record(self) -> CommandRecord {
        let (command_type, center, radius, param0, param1) = match self {
            Command::PlaceVoxel {
                center,
                radius,
                kind,
                extra,
            } => (CMD_PLACE_VOXEL, center, radius, kind as u32, extra),
            Command::RemoveVoxel { center, radius } => (CMD_REMOVE_VOXEL, center, radius, 0, 0),
            Command::SeedProtocells {
                center,
                radius,
                energy,
            } => (CMD_SEED_PROTOCELLS, center, radius, energy, 0),
            Command::ApplyToxin {
                center,
                radius,
                threshold,
            } => (CMD_APPLY_TOXIN, center, radius, threshold, 0),
        };
        CommandRecord {
            command_type,
            x: center[0],
            y: center[1],
            z: center[2],
            radius,
            param0,
            param1,
            _pad: [0; 9],
        }
    }

    pub fn center(&self) -> [u32; 3] {
        match *self {
            Command::PlaceVoxel { center, .. }
            | Command::RemoveVoxel { center, .. }
            | Command::SeedProtocells { center, .. }
            | Command::ApplyToxin { center, .. } => center,
        }
    }

    pub fn radius(&self) -> u32 {
        match *self {
            Command::PlaceVoxel { radius, .. }
            | Command::RemoveVoxel { radius, .. }
            | Command::SeedProtocells { radius, .. }
            | Command::ApplyToxin { radius, .. } => radius,
        }
    }

    /// Bounds check against the grid. Commands centered outside the grid are
    /// dropped by the scheduler; the brush itself may overhang edges.
    pub fn in_grid(&self, grid_size: u32) -> bool {
        self.center().iter().all(|&c| c < grid_size)
    }
}

/// Serialize a tick's command batch into the wire buffer image: inline count
/// word followed by the records. The output length is fixed so the whole
/// buffer is rewritten every upload.
pub fn serialize_commands(commands: &[Command]) -> Vec<u32> {
    debug_assert!(commands.len() <= MAX_COMMANDS);
    let mut words = vec![0u32; COMMAND_BUFFER_WORDS];
    words[0] = commands.len().min(MAX_COMMANDS) as u32;
    for (i, command) in commands.iter().take(MAX_COMMANDS).enumerate() {
        let record = command.to_record();
        let base = 1 + i * COMMAND_WORDS;
        words[base..base + COMMAND_WORDS].copy_from_slice(bytemuck::cast_slice(&[record]));
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_64_bytes() {
        assert_eq!(std::mem::size_of::<CommandRecord>(), 64);
    }

    #[test]
    fn serialized_batch_has_count_prefix() {
        let batch = [
            Command::RemoveVoxel {
                center: [1, 2, 3],
                radius: 4,
            },
            Command::ApplyToxin {
                center: [5, 6, 7],
                radius: 0,
                threshold: 128,
            },
        ];
        let words = serialize_commands(&batch);
        assert_eq!(words.len(), COMMAND_BUFFER_WORDS);
        assert_eq!(words[0], 2);
        assert_eq!(words[1], CMD_REMOVE_VOXEL);
        assert_eq!(words[2..5], [1, 2, 3]);
        let base = 1 + COMMAND_WORDS;
        assert_eq!(words[base], CMD_APPLY_TOXIN);
        assert_eq!(words[base + 5], 128);
    }
}
