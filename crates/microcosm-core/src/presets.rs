//! Scenario presets, each expressed as a single burst of wire commands so
//! they replay through the same path as player input.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::layout::{
    Command, VoxelKind, NUTRIENT_DEFAULT_CONCENTRATION, PROTOCELL_DEFAULT_ENERGY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Central protocell cluster with nutrient pockets around it.
    PetriDish,
    /// Heat and cold poles on opposite faces, life seeded between them.
    Gradient,
    /// Walled enclosure with energy sources in the corners.
    Arena,
}

/// Build the command burst for a preset. Deterministic for a given seed and
/// grid size.
pub fn commands(preset: Preset, grid_size: u32, seed: u64) -> Vec<Command> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let c = grid_size / 2;
    let mut burst = Vec::new();

    match preset {
        Preset::PetriDish => {
            burst.push(Command::SeedProtocells {
                center: [c, c, c],
                radius: (grid_size / 12).max(2),
                energy: PROTOCELL_DEFAULT_ENERGY,
            });
            let spread = (grid_size / 4).max(6);
            for _ in 0..20 {
                let center = scatter(&mut rng, [c, c, c], spread, grid_size);
                burst.push(Command::PlaceVoxel {
                    center,
                    radius: rng.gen_range(1..=2),
                    kind: VoxelKind::Nutrient,
                    extra: NUTRIENT_DEFAULT_CONCENTRATION,
                });
            }
            for _ in 0..3 {
                let center = scatter(&mut rng, [c, c, c], spread, grid_size);
                burst.push(Command::PlaceVoxel {
                    center,
                    radius: 1,
                    kind: VoxelKind::EnergySource,
                    extra: 0,
                });
            }
        }
        Preset::Gradient => {
            let pole = (grid_size / 16).max(2);
            burst.push(Command::PlaceVoxel {
                center: [c, c, grid_size - 1 - pole],
                radius: pole,
                kind: VoxelKind::HeatSource,
                extra: 0,
            });
            burst.push(Command::PlaceVoxel {
                center: [c, c, pole],
                radius: pole,
                kind: VoxelKind::ColdSource,
                extra: 0,
            });
            burst.push(Command::SeedProtocells {
                center: [c, c, c],
                radius: (grid_size / 12).max(2),
                energy: PROTOCELL_DEFAULT_ENERGY,
            });
            let spread = (grid_size / 3).max(8);
            for _ in 0..16 {
                let center = scatter(&mut rng, [c, c, c], spread, grid_size);
                burst.push(Command::PlaceVoxel {
                    center,
                    radius: rng.gen_range(1..=2),
                    kind: VoxelKind::Nutrient,
                    extra: NUTRIENT_DEFAULT_CONCENTRATION,
                });
            }
        }
        Preset::Arena => {
            // solid cube, then hollow it: a two-voxel shell remains
            let half = (grid_size / 2).min(48);
            burst.push(Command::PlaceVoxel {
                center: [c, c, c],
                radius: half,
                kind: VoxelKind::Wall,
                extra: 0,
            });
            burst.push(Command::RemoveVoxel {
                center: [c, c, c],
                radius: half - 2,
            });
            let inner = half - 4;
            for &dx in &[-1i64, 1] {
                for &dy in &[-1i64, 1] {
                    for &dz in &[-1i64, 1] {
                        let corner = [
                            (c as i64 + dx * inner as i64) as u32,
                            (c as i64 + dy * inner as i64) as u32,
                            (c as i64 + dz * inner as i64) as u32,
                        ];
                        burst.push(Command::PlaceVoxel {
                            center: corner,
                            radius: 1,
                            kind: VoxelKind::EnergySource,
                            extra: 0,
                        });
                    }
                }
            }
            burst.push(Command::SeedProtocells {
                center: [c, c, c],
                radius: (inner / 4).max(2),
                energy: PROTOCELL_DEFAULT_ENERGY,
            });
            for _ in 0..12 {
                let center = scatter(&mut rng, [c, c, c], inner.saturating_sub(2).max(4), grid_size);
                burst.push(Command::PlaceVoxel {
                    center,
                    radius: 1,
                    kind: VoxelKind::Nutrient,
                    extra: NUTRIENT_DEFAULT_CONCENTRATION,
                });
            }
        }
    }
    burst
}

fn scatter(rng: &mut ChaCha8Rng, center: [u32; 3], spread: u32, grid_size: u32) -> [u32; 3] {
    let mut out = [0u32; 3];
    for (o, &c) in out.iter_mut().zip(center.iter()) {
        let lo = c.saturating_sub(spread);
        let hi = (c + spread).min(grid_size - 1);
        *o = rng.gen_range(lo..=hi);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::MAX_COMMANDS;

    #[test]
    fn bursts_fit_one_tick_and_replay_identically() {
        for preset in [Preset::PetriDish, Preset::Gradient, Preset::Arena] {
            let a = commands(preset, 64, 7);
            let b = commands(preset, 64, 7);
            assert_eq!(a, b);
            assert!(!a.is_empty());
            assert!(a.len() <= MAX_COMMANDS);
            assert!(a.iter().all(|cmd| cmd.in_grid(64)));
        }
    }
}
