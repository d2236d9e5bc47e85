use std::path::{Path, PathBuf};

use anyhow::Result;
use image::{ImageBuffer, Rgb, RgbImage};

use microcosm_core::{Engine, GpuContext, VoxelKind};

/// Snapshot writer for central-slice images of the voxel grid.
pub struct SnapshotWriter {
    output_dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(output_dir: &Path) -> Result<Self> {
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Write the central Z slice as a type-colored PNG.
    pub fn write_slice(&self, tick: u32, ctx: &GpuContext, engine: &Engine) -> Result<()> {
        let grid = engine.grid_size();
        let slice = engine.read_voxel_slice(ctx, grid / 2);
        let mut img: RgbImage = ImageBuffer::new(grid, grid);
        for y in 0..grid {
            for x in 0..grid {
                let color = match &slice[(y * grid + x) as usize] {
                    Some(voxel) => type_color(&voxel.kind, voxel.energy),
                    // unallocated bricks in sparse mode
                    None => [8, 8, 12],
                };
                img.put_pixel(x, y, Rgb(color));
            }
        }
        let filepath = self.output_dir.join(format!("slice_{tick:06}.png"));
        img.save(&filepath)?;
        Ok(())
    }
}

fn type_color(kind: &VoxelKind, energy: u16) -> [u8; 3] {
    match kind {
        VoxelKind::Empty => [0, 0, 0],
        VoxelKind::Wall => [110, 110, 115],
        VoxelKind::Nutrient => [60, 190, 80],
        VoxelKind::EnergySource => [240, 215, 65],
        VoxelKind::Protocell => {
            let b = 90 + (energy / 500).min(165) as u8;
            [b, 40, b]
        }
        VoxelKind::Waste => [115, 85, 55],
        VoxelKind::HeatSource => [240, 60, 40],
        VoxelKind::ColdSource => [50, 115, 240],
    }
}
