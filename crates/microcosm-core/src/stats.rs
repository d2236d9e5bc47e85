//! Population statistics: the raw GPU accumulator image and the snapshot
//! surfaced to consumers with 1-2 frames of latency.

use bytemuck::{Pod, Zeroable};

pub const HISTOGRAM_SLOTS: usize = 12;

/// Byte-for-byte image of the GPU stats buffer (the WGSL `Stats` struct with
/// the atomics read as plain words).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct StatsRaw {
    pub population: u32,
    pub energy_lo: u32,
    pub energy_hi: u32,
    pub max_energy: u32,
    pub species: [u32; HISTOGRAM_SLOTS],
    pub counts: [u32; HISTOGRAM_SLOTS],
}

pub const STATS_BUFFER_SIZE: u64 = std::mem::size_of::<StatsRaw>() as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SpeciesCount {
    pub species_id: u16,
    pub count: u32,
}

/// One tick's population summary.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StatsSnapshot {
    pub tick: u32,
    pub population: u32,
    pub total_energy: u64,
    pub max_energy: u32,
    /// Approximate top species, largest first. At most 12 entries; hash
    /// collisions in the reduction may drop rare species.
    pub top_species: Vec<SpeciesCount>,
}

impl StatsSnapshot {
    pub fn from_raw(tick: u32, raw: &StatsRaw) -> Self {
        let mut top_species: Vec<SpeciesCount> = raw
            .species
            .iter()
            .zip(raw.counts.iter())
            .filter(|(&species, _)| species != 0)
            .map(|(&species, &count)| SpeciesCount {
                species_id: species as u16,
                count,
            })
            .collect();
        top_species.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.species_id.cmp(&b.species_id))
        });
        Self {
            tick,
            population: raw.population,
            total_energy: ((raw.energy_hi as u64) << 32) | raw.energy_lo as u64,
            max_energy: raw.max_energy,
            top_species,
        }
    }
}
