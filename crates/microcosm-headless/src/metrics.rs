use std::fs::File;
use std::path::Path;

use csv::Writer;

use microcosm_core::StatsSnapshot;

/// Metrics writer for CSV output. One row per surfaced stats snapshot.
pub struct MetricsWriter {
    csv_writer: Writer<File>,
    rows: u32,
}

impl MetricsWriter {
    pub fn new(output_dir: &Path) -> Result<Self, anyhow::Error> {
        let file = File::create(output_dir.join("metrics.csv"))?;
        let mut csv_writer = Writer::from_writer(file);
        csv_writer.write_record([
            "tick",
            "population",
            "total_energy",
            "max_energy",
            "species_count",
            "top_species_id",
            "top_species_population",
        ])?;
        Ok(Self {
            csv_writer,
            rows: 0,
        })
    }

    pub fn write_snapshot(&mut self, snapshot: &StatsSnapshot) -> Result<(), anyhow::Error> {
        let top = snapshot.top_species.first();
        self.csv_writer.write_record([
            snapshot.tick.to_string(),
            snapshot.population.to_string(),
            snapshot.total_energy.to_string(),
            snapshot.max_energy.to_string(),
            snapshot.top_species.len().to_string(),
            top.map_or_else(String::new, |s| s.species_id.to_string()),
            top.map_or_else(String::new, |s| s.count.to_string()),
        ])?;
        self.csv_writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> u32 {
        self.rows
    }
}
