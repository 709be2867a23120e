//! Uniform latitude/longitude grid for bounding-box lookups

use std::collections::HashMap;

use hyperion_core::{BoundingBox, Coordinates, SequenceId};

/// Configuration for the spatial grid
#[derive(Debug, Clone, Copy)]
pub struct GridConfig {
    /// Cell edge in degrees (0.1° is roughly 11 km of latitude)
    pub cell_degrees: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { cell_degrees: 0.1 }
    }
}

impl GridConfig {
    /// Create config with a specific cell size
    pub fn with_cell_degrees(cell_degrees: f64) -> Self {
        Self { cell_degrees }
    }
}

type Cell = (i32, i32);

/// Bucketed spatial index for range queries
///
/// Instead of scanning every record for a bounding-box query, this keeps
/// sequence ids bucketed by grid cell and only visits the cells the box
/// overlaps. Candidates still need an exact `contains` check because cells
/// over-cover the box edges.
#[derive(Debug, Clone)]
pub struct GridIndex {
    cell_degrees: f64,
    cells: HashMap<Cell, Vec<SequenceId>>,
}

impl GridIndex {
    pub fn new(config: GridConfig) -> Self {
        let cell_degrees = if config.cell_degrees.is_finite() && config.cell_degrees > 0.0 {
            config.cell_degrees
        } else {
            GridConfig::default().cell_degrees
        };

        Self {
            cell_degrees,
            cells: HashMap::new(),
        }
    }

    fn cell_of(&self, latitude: f64, longitude: f64) -> Cell {
        (
            (latitude / self.cell_degrees).floor() as i32,
            (longitude / self.cell_degrees).floor() as i32,
        )
    }

    /// Index a record position
    pub fn insert(&mut self, position: &Coordinates, sequence_id: SequenceId) {
        let cell = self.cell_of(position.latitude, position.longitude);
        self.cells.entry(cell).or_default().push(sequence_id);
    }

    /// Sequence ids in every cell the box touches, ascending
    pub fn candidates(&self, bbox: &BoundingBox) -> Vec<SequenceId> {
        if bbox.is_empty() {
            return Vec::new();
        }

        let (lat_lo, lon_lo) = self.cell_of(bbox.lat_min, bbox.lon_min);
        let (lat_hi, lon_hi) = self.cell_of(bbox.lat_max, bbox.lon_max);
        let span = (i64::from(lat_hi) - i64::from(lat_lo) + 1)
            * (i64::from(lon_hi) - i64::from(lon_lo) + 1);

        let mut ids: Vec<SequenceId> = if span as usize > self.cells.len() {
            // Sparse grid: walking occupied cells is cheaper than walking the box
            self.cells
                .iter()
                .filter(|((lat, lon), _)| {
                    (lat_lo..=lat_hi).contains(lat) && (lon_lo..=lon_hi).contains(lon)
                })
                .flat_map(|(_, ids)| ids.iter().copied())
                .collect()
        } else {
            let mut ids = Vec::new();
            for lat in lat_lo..=lat_hi {
                for lon in lon_lo..=lon_hi {
                    if let Some(bucket) = self.cells.get(&(lat, lon)) {
                        ids.extend_from_slice(bucket);
                    }
                }
            }
            ids
        };

        ids.sort_unstable();
        ids
    }

    /// Number of occupied cells
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}
