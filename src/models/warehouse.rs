//! Warehouse layout model.
//!
//! A fixed floor plan: dimensions, a discrete grid, input/output docks, and
//! a storage-slot catalog tagged by demand class (ABC turnover
//! classification — A slots sit closest to the output dock). The layout is
//! generated deterministically from the configuration and consumed as
//! read-only reference data by the engine, the generator, and the optimizer.
//!
//! Two distance metrics coexist on purpose: Manhattan distance governs
//! motion and travel-time estimation (vehicles drive axis-aligned aisles),
//! Euclidean distance governs collision safety checks only.

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;

/// A point on the warehouse floor, in continuous units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Creates a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Manhattan distance: governs motion and travel-time estimation.
    #[inline]
    pub fn manhattan_distance(&self, other: Point) -> f64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Euclidean distance: governs collision safety checks only.
    #[inline]
    pub fn euclidean_distance(&self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Demand class of an item or storage slot (ABC turnover classification).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DemandClass {
    /// High turnover; stored closest to the output dock.
    A,
    /// Medium turnover.
    B,
    /// Low turnover; stored furthest away.
    C,
}

impl DemandClass {
    /// All classes, in storage-priority order.
    pub const ALL: [DemandClass; 3] = [DemandClass::A, DemandClass::B, DemandClass::C];
}

/// A storage slot holding crates of one demand class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSlot {
    /// Slot position on the floor.
    pub position: Point,
    /// Demand class of the goods stored here.
    pub class: DemandClass,
    /// Crate capacity of the slot.
    pub capacity: u32,
}

/// A fixed warehouse floor plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseLayout {
    /// Floor width (units).
    pub width: f64,
    /// Floor height (units).
    pub height: f64,
    /// Grid cell resolution (units per cell).
    pub grid_size: f64,
    /// Goods-in dock.
    pub input_dock: Point,
    /// Goods-out dock; delivery target of every order.
    pub output_dock: Point,
    /// Storage-slot catalog.
    pub slots: Vec<StorageSlot>,
}

impl WarehouseLayout {
    /// Generates the fixed layout described by the configuration.
    ///
    /// Slots are laid out in vertical aisles between the docks; each demand
    /// class occupies a band of aisles, A nearest the output dock. The
    /// construction is deterministic: the same configuration always yields
    /// the same layout.
    pub fn generate(config: &SimulationConfig) -> Self {
        let input_dock = Point::new(1.0, config.warehouse_height / 2.0);
        let output_dock = Point::new(config.warehouse_width - 1.0, config.warehouse_height / 2.0);

        let mut slots = Vec::with_capacity(config.slots_per_class * DemandClass::ALL.len());
        let usable_width = config.warehouse_width - 8.0;
        let band_width = usable_width / DemandClass::ALL.len() as f64;
        let rows = 8usize;
        let cols = config.slots_per_class.div_ceil(rows);

        for (band, &class) in DemandClass::ALL.iter().enumerate() {
            // Band 0 (class A) starts nearest the output dock.
            let band_right = config.warehouse_width - 4.0 - band as f64 * band_width;
            for i in 0..config.slots_per_class {
                let col = i / rows;
                let row = i % rows;
                let x = band_right - col as f64 * (band_width / cols as f64);
                let y = 2.0 + row as f64 * ((config.warehouse_height - 4.0) / rows as f64);
                slots.push(StorageSlot {
                    position: Point::new(
                        Self::snap(x, config.grid_size),
                        Self::snap(y, config.grid_size),
                    ),
                    class,
                    capacity: config.slot_capacity,
                });
            }
        }

        Self {
            width: config.warehouse_width,
            height: config.warehouse_height,
            grid_size: config.grid_size,
            input_dock,
            output_dock,
            slots,
        }
    }

    fn snap(value: f64, grid_size: f64) -> f64 {
        (value / grid_size).round() * grid_size
    }

    /// Nearest slot of the given class, by Manhattan distance to the output
    /// dock, with at least `capacity_needed` crate capacity.
    ///
    /// Returns `None` when no slot of the class can hold the requested
    /// capacity.
    pub fn nearest_slot(&self, class: DemandClass, capacity_needed: u32) -> Option<&StorageSlot> {
        self.slots
            .iter()
            .filter(|s| s.class == class && s.capacity >= capacity_needed)
            .min_by(|a, b| {
                let da = a.position.manhattan_distance(self.output_dock);
                let db = b.position.manhattan_distance(self.output_dock);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    /// Manhattan distance in whole grid cells.
    pub fn grid_distance(&self, a: Point, b: Point) -> u32 {
        let cells_x = ((a.x - b.x).abs() / self.grid_size).round() as u32;
        let cells_y = ((a.y - b.y).abs() / self.grid_size).round() as u32;
        cells_x + cells_y
    }

    /// Whether a point lies on the floor.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= 0.0 && p.x <= self.width && p.y >= 0.0 && p.y <= self.height
    }
}
