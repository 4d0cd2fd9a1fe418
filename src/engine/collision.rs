//! Collision occupancy grid.
//!
//! Rebuilt every tick: each vehicle marks its own cell plus a fixed-radius
//! neighborhood. Cells shared by two or more vehicles yield candidate
//! pairs for the exact Euclidean proximity check — the grid prunes the
//! pairwise test, it never decides a collision by itself.

use std::collections::{BTreeSet, HashMap};

use crate::models::{Point, Vehicle, VehicleId};

/// Sparse cell-occupancy index over the warehouse floor.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    cell_size: f64,
    cols: i64,
    rows: i64,
    occupants: HashMap<(i64, i64), Vec<VehicleId>>,
}

impl OccupancyGrid {
    /// Creates an empty grid over a `width` × `height` floor.
    pub fn new(width: f64, height: f64, cell_size: f64) -> Self {
        Self {
            cell_size,
            cols: (width / cell_size).ceil() as i64,
            rows: (height / cell_size).ceil() as i64,
            occupants: HashMap::new(),
        }
    }

    fn cell_of(&self, p: Point) -> (i64, i64) {
        let col = (p.x / self.cell_size).floor() as i64;
        let row = (p.y / self.cell_size).floor() as i64;
        (col.clamp(0, self.cols - 1), row.clamp(0, self.rows - 1))
    }

    /// Clears all markings.
    pub fn clear(&mut self) {
        self.occupants.clear();
    }

    /// Re-marks every vehicle's cell and its neighborhood within `radius`.
    pub fn rebuild(&mut self, vehicles: &[Vehicle], radius: f64) {
        self.occupants.clear();
        let reach = (radius / self.cell_size).ceil() as i64;
        for vehicle in vehicles {
            let (col, row) = self.cell_of(vehicle.position);
            for dc in -reach..=reach {
                for dr in -reach..=reach {
                    let c = (col + dc).clamp(0, self.cols - 1);
                    let r = (row + dr).clamp(0, self.rows - 1);
                    let ids = self.occupants.entry((c, r)).or_default();
                    if !ids.contains(&vehicle.id) {
                        ids.push(vehicle.id);
                    }
                }
            }
        }
    }

    /// Vehicle pairs sharing at least one marked cell, each pair once,
    /// ordered `(smaller id, larger id)` and sorted — deterministic
    /// regardless of map iteration order.
    pub fn candidate_pairs(&self) -> Vec<(VehicleId, VehicleId)> {
        let mut pairs = BTreeSet::new();
        for ids in self.occupants.values() {
            for (i, &a) in ids.iter().enumerate() {
                for &b in &ids[i + 1..] {
                    pairs.insert((a.min(b), a.max(b)));
                }
            }
        }
        pairs.into_iter().collect()
    }

    /// Number of marked cells (test visibility).
    pub fn marked_cells(&self) -> usize {
        self.occupants.len()
    }
}
