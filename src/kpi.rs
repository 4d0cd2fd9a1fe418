//! Fleet performance metrics (KPIs).
//!
//! Computes performance indicators from the fleet, the order list, and the
//! elapsed simulated time. The computation is a pure function: it never
//! mutates simulation state, so reporting and the optimizer share it.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Idle fraction | Σ per-vehicle idle minutes ÷ (fleet size × elapsed) |
//! | Fleet utilization | Mean of per-vehicle (1 − idle/elapsed) |
//! | On-time rate | completed ÷ (completed + late), 0 when none finished |
//! | Throughput | Completed orders per hour |
//! | Distance per order | Total distance ÷ completed orders |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{ConfigError, KpiTargets};
use crate::models::{Order, OrderStatus, Vehicle, VehicleState};

/// Weights of the scalar fitness over the three normalized components
/// (1 − idle fraction, utilization, on-time rate).
///
/// Must sum to 1 — this is the caller's precondition, checked by
/// [`KpiWeights::validate`] at configuration time and never auto-normalized.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KpiWeights {
    /// Weight of (1 − idle fraction).
    pub idle: f64,
    /// Weight of fleet utilization.
    pub utilization: f64,
    /// Weight of the on-time rate.
    pub on_time: f64,
}

impl Default for KpiWeights {
    fn default() -> Self {
        Self {
            idle: 0.30,
            utilization: 0.40,
            on_time: 0.30,
        }
    }
}

impl KpiWeights {
    /// Rejects weights that are negative or do not sum to 1.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("kpi_weights.idle", self.idle),
            ("kpi_weights.utilization", self.utilization),
            ("kpi_weights.on_time", self.on_time),
        ] {
            if value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }
        let sum = self.idle + self.utilization + self.on_time;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::KpiWeightSum { sum });
        }
        Ok(())
    }
}

/// On-time counts for one shift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftKpi {
    /// Orders delivered on time during the shift.
    pub completed: u32,
    /// Orders delivered late during the shift.
    pub late: u32,
}

impl ShiftKpi {
    /// On-time fraction for the shift; 0 when nothing finished.
    pub fn on_time_rate(&self) -> f64 {
        let total = self.completed + self.late;
        if total == 0 {
            0.0
        } else {
            self.completed as f64 / total as f64
        }
    }
}

/// One performance snapshot, emitted per tick and appended to the state's
/// KPI history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiSnapshot {
    /// Simulated time of the snapshot (minutes).
    pub timestamp_min: f64,
    /// Fleet idle-time fraction (0.0..1.0).
    pub idle_fraction: f64,
    /// Fleet-average utilization (0.0..1.0).
    pub fleet_utilization: f64,
    /// Vehicles currently moving, loading, or unloading.
    pub active_vehicles: u32,
    /// On-time delivery fraction; 0 when no order has finished.
    pub on_time_rate: f64,
    /// Orders delivered on time so far.
    pub completed_orders: u32,
    /// Orders delivered late so far.
    pub late_orders: u32,
    /// Total fleet distance traveled (units).
    pub total_distance: f64,
    /// Completed orders per simulated hour.
    pub throughput_per_hour: f64,
    /// Distance per completed order; 0 when none completed.
    pub distance_per_order: f64,
    /// On-time breakdown per shift index.
    pub per_shift: BTreeMap<u32, ShiftKpi>,
}

impl KpiSnapshot {
    /// Computes a snapshot from the fleet and order list at `elapsed_min`.
    pub fn compute(
        vehicles: &[Vehicle],
        orders: &[Order],
        elapsed_min: f64,
        shift_length_min: f64,
    ) -> Self {
        let fleet = vehicles.len() as f64;

        let (idle_fraction, fleet_utilization) = if elapsed_min <= 0.0 || vehicles.is_empty() {
            (0.0, 0.0)
        } else {
            let idle_sum: f64 = vehicles.iter().map(|v| v.idle_min).sum();
            let util_sum: f64 = vehicles.iter().map(|v| v.utilization(elapsed_min)).sum();
            (
                (idle_sum / (fleet * elapsed_min)).clamp(0.0, 1.0),
                util_sum / fleet,
            )
        };

        let active_vehicles = vehicles
            .iter()
            .filter(|v| {
                matches!(
                    v.state(),
                    VehicleState::Moving | VehicleState::Loading | VehicleState::Unloading
                )
            })
            .count() as u32;

        let mut completed_orders = 0u32;
        let mut late_orders = 0u32;
        let mut per_shift: BTreeMap<u32, ShiftKpi> = BTreeMap::new();
        for order in orders {
            let (terminal, on_time) = match order.status() {
                OrderStatus::Completed => (true, true),
                OrderStatus::Late => (true, false),
                _ => (false, false),
            };
            if !terminal {
                continue;
            }
            if on_time {
                completed_orders += 1;
            } else {
                late_orders += 1;
            }
            if let Some(completion) = order.completion_min() {
                let shift = (completion / shift_length_min) as u32;
                let entry = per_shift.entry(shift).or_default();
                if on_time {
                    entry.completed += 1;
                } else {
                    entry.late += 1;
                }
            }
        }

        let finished = completed_orders + late_orders;
        let on_time_rate = if finished == 0 {
            0.0
        } else {
            completed_orders as f64 / finished as f64
        };

        let total_distance: f64 = vehicles.iter().map(|v| v.distance_traveled).sum();
        let throughput_per_hour = if elapsed_min <= 0.0 {
            0.0
        } else {
            completed_orders as f64 / (elapsed_min / 60.0)
        };
        let distance_per_order = if completed_orders == 0 {
            0.0
        } else {
            total_distance / completed_orders as f64
        };

        Self {
            timestamp_min: elapsed_min,
            idle_fraction,
            fleet_utilization,
            active_vehicles,
            on_time_rate,
            completed_orders,
            late_orders,
            total_distance,
            throughput_per_hour,
            distance_per_order,
            per_shift,
        }
    }

    /// Scalar fitness: Σ weightᵢ × clamp(componentᵢ, 0, 1) over
    /// {1 − idle fraction, utilization, on-time rate}.
    ///
    /// With non-negative weights summing to 1 the result lies in [0, 1].
    pub fn fitness(&self, weights: &KpiWeights) -> f64 {
        weights.idle * (1.0 - self.idle_fraction).clamp(0.0, 1.0)
            + weights.utilization * self.fleet_utilization.clamp(0.0, 1.0)
            + weights.on_time * self.on_time_rate.clamp(0.0, 1.0)
    }

    /// Whether the snapshot meets the configured performance targets.
    pub fn meets_targets(&self, targets: &KpiTargets) -> bool {
        self.fleet_utilization >= targets.utilization && self.on_time_rate >= targets.on_time
    }
}
