//! Simulation configuration.
//!
//! All tunable constants — capacities, speeds, grid resolution, shift
//! timing, scoring weights, performance targets — live in one immutable
//! value threaded through the layout generator, the vehicle model, and the
//! engine constructors. Nothing reads ambient global state.
//!
//! Configuration problems are rejected up front by [`SimulationConfig::validate`]
//! and the weight bundles' own `validate` methods; they are never discovered
//! mid-run.

use serde::{Deserialize, Serialize};

/// Configuration-time validation failure.
///
/// Raised before a simulation or optimization run starts. Runtime
/// conditions (an unassignable order, a missed deadline) are *data*, not
/// errors, and never surface through this type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// KPI weights must sum to 1; they are not auto-normalized.
    #[error("KPI weights must sum to 1.0, got {sum}")]
    KpiWeightSum { sum: f64 },
    /// A weight or physical parameter was negative where it must not be.
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },
    /// A parameter that must be strictly positive was zero or negative.
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },
    /// A probability distribution did not sum to 1.
    #[error("{field} must sum to 1.0, got {sum}")]
    DistributionSum { field: &'static str, sum: f64 },
    /// The shaking-intensity sequence was empty.
    #[error("shaking intensity sequence must not be empty")]
    EmptyIntensities,
    /// The shaking-intensity sequence must be ascending and non-zero.
    #[error("shaking intensities must be ascending and non-zero: {0:?}")]
    BadIntensities(Vec<u32>),
    /// An iteration cap was zero.
    #[error("{field} must be at least 1")]
    ZeroCap { field: &'static str },
}

/// Weights for the engine's pending-order dispatch score.
///
/// A feasible vehicle is scored as
/// `urgency * bonus + utilization * (1 - busyness) - distance * normalized_distance`
/// and the argmax wins. Ad hoc constants from the reference tuning; kept
/// configurable rather than assumed optimal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DispatchWeights {
    /// Bonus weight applied when the order is urgent.
    pub urgency: f64,
    /// Weight favoring less-utilized vehicles.
    pub utilization: f64,
    /// Penalty weight on normalized Manhattan distance to the pickup.
    pub distance: f64,
}

impl Default for DispatchWeights {
    fn default() -> Self {
        Self {
            urgency: 0.3,
            utilization: 0.3,
            distance: 0.4,
        }
    }
}

/// Weights for the optimizer's construction / reinsertion score.
///
/// A feasible vehicle is scored as
/// `distance / (1 + d/10) + balance / (1 + assigned/5) + urgency_bonus`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InsertionWeights {
    /// Weight on the proximity score `1 / (1 + d/10)`.
    pub distance: f64,
    /// Weight on the load-balance score `1 / (1 + assigned/5)`.
    pub balance: f64,
    /// Weight of the urgency bonus (1 for urgent orders, 0 otherwise).
    pub urgency: f64,
}

impl Default for InsertionWeights {
    fn default() -> Self {
        Self {
            distance: 0.4,
            balance: 0.4,
            urgency: 0.2,
        }
    }
}

/// Performance targets a run is judged against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KpiTargets {
    /// Minimum acceptable fleet-average utilization (0.0..1.0).
    pub utilization: f64,
    /// Minimum acceptable on-time delivery fraction (0.0..1.0).
    pub on_time: f64,
}

impl Default for KpiTargets {
    fn default() -> Self {
        Self {
            utilization: 0.75,
            on_time: 0.95,
        }
    }
}

/// Immutable parameter set for one simulation.
///
/// Times are simulated minutes, positions warehouse units, weights
/// kilograms. Defaults describe the reference warehouse: a 50×30 floor on
/// a 0.25-unit grid, 20 kg / 5 crate vehicles, 12-hour shifts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Warehouse floor width (units).
    pub warehouse_width: f64,
    /// Warehouse floor height (units).
    pub warehouse_height: f64,
    /// Grid cell resolution (units per cell).
    pub grid_size: f64,
    /// Storage slots generated per demand class.
    pub slots_per_class: usize,
    /// Crate capacity of a single storage slot.
    pub slot_capacity: u32,

    /// Vehicle payload capacity (kg).
    pub capacity_kg: f64,
    /// Vehicle crate capacity.
    pub capacity_crates: u32,
    /// Vehicle speed (units per simulated minute).
    pub speed: f64,
    /// Loading dwell per crate (minutes).
    pub load_min_per_crate: f64,
    /// Unloading dwell per crate (minutes). Intentionally faster than loading.
    pub unload_min_per_crate: f64,
    /// Collision safety radius (units, Euclidean).
    pub safety_radius: f64,
    /// Arrival tolerance: a vehicle closer than this to its target has arrived.
    pub arrival_epsilon: f64,

    /// Shift length (minutes). Two shifts per operating day.
    pub shift_length_min: f64,
    /// Full work-time budget of a vehicle (minutes).
    pub work_budget_min: f64,
    /// Budget level below which an idle vehicle goes to charge.
    pub low_work_threshold_min: f64,
    /// Budget minutes restored per elapsed minute while charging.
    pub charge_rate: f64,
    /// Length of the handoff window after a shift boundary (minutes).
    pub handoff_window_min: f64,
    /// Budget level below which a vehicle is rotated out during handoff.
    pub handoff_work_threshold_min: f64,
    /// Fixed safety margin added to task-time estimates in feasibility checks.
    pub feasibility_buffer_min: f64,

    /// Engine tick length (minutes).
    pub tick_min: f64,
    /// Simulation speed multiplier applied to every tick.
    pub time_scale: f64,

    /// Weights for the engine dispatch score.
    pub dispatch_weights: DispatchWeights,
    /// Weights for the optimizer construction / reinsertion score.
    pub insertion_weights: InsertionWeights,
    /// Performance targets.
    pub targets: KpiTargets,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            warehouse_width: 50.0,
            warehouse_height: 30.0,
            grid_size: 0.25,
            slots_per_class: 40,
            slot_capacity: 6,
            capacity_kg: 20.0,
            capacity_crates: 5,
            speed: 30.0,
            load_min_per_crate: 0.5,
            unload_min_per_crate: 0.25,
            safety_radius: 0.5,
            arrival_epsilon: 1e-3,
            shift_length_min: 720.0,
            work_budget_min: 720.0,
            low_work_threshold_min: 30.0,
            charge_rate: 4.0,
            handoff_window_min: 15.0,
            handoff_work_threshold_min: 60.0,
            feasibility_buffer_min: 5.0,
            tick_min: 0.1,
            time_scale: 1.0,
            dispatch_weights: DispatchWeights::default(),
            insertion_weights: InsertionWeights::default(),
            targets: KpiTargets::default(),
        }
    }
}

impl SimulationConfig {
    /// Checks physical parameters for sanity.
    ///
    /// Must be called once at configuration time; the engine itself never
    /// re-validates mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("warehouse_width", self.warehouse_width),
            ("warehouse_height", self.warehouse_height),
            ("grid_size", self.grid_size),
            ("capacity_kg", self.capacity_kg),
            ("speed", self.speed),
            ("shift_length_min", self.shift_length_min),
            ("work_budget_min", self.work_budget_min),
            ("charge_rate", self.charge_rate),
            ("tick_min", self.tick_min),
            ("time_scale", self.time_scale),
        ];
        for (field, value) in positive {
            if value <= 0.0 {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        let non_negative = [
            ("load_min_per_crate", self.load_min_per_crate),
            ("unload_min_per_crate", self.unload_min_per_crate),
            ("safety_radius", self.safety_radius),
            ("low_work_threshold_min", self.low_work_threshold_min),
            ("handoff_window_min", self.handoff_window_min),
            ("feasibility_buffer_min", self.feasibility_buffer_min),
        ];
        for (field, value) in non_negative {
            if value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }
        Ok(())
    }

    /// Travel time in minutes for a given Manhattan distance.
    #[inline]
    pub fn travel_min(&self, distance: f64) -> f64 {
        distance / self.speed
    }
}
