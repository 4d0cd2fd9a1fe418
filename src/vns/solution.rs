//! Candidate solution value for the VNS search.
//!
//! A solution is an order→vehicle assignment plus a visiting order per
//! vehicle, frozen together with the KPI snapshot and fitness obtained by
//! evaluating it. Solutions are immutable once constructed: every
//! neighborhood and shaking operator returns a fresh value, and a
//! superseded solution is simply dropped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::kpi::KpiSnapshot;
use crate::models::{OrderId, VehicleId};

/// Per-vehicle ordered task lists. `BTreeMap` keeps iteration — and with
/// it the whole search — deterministic.
pub type Routes = BTreeMap<VehicleId, Vec<OrderId>>;

/// An evaluated candidate assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VnsSolution {
    assignment: BTreeMap<OrderId, VehicleId>,
    routes: Routes,
    kpi: KpiSnapshot,
    fitness: f64,
    feasible: bool,
}

impl VnsSolution {
    /// Freezes an evaluated candidate. The assignment map is derived from
    /// the routes, so each order maps to at most one vehicle.
    pub(crate) fn new(routes: Routes, kpi: KpiSnapshot, fitness: f64, feasible: bool) -> Self {
        let assignment = routes
            .iter()
            .flat_map(|(&vehicle, route)| route.iter().map(move |&order| (order, vehicle)))
            .collect();
        Self {
            assignment,
            routes,
            kpi,
            fitness,
            feasible,
        }
    }

    /// Order → vehicle map.
    pub fn assignment(&self) -> &BTreeMap<OrderId, VehicleId> {
        &self.assignment
    }

    /// Ordered task list per vehicle.
    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    /// KPI snapshot from the evaluating simulation.
    pub fn kpi(&self) -> &KpiSnapshot {
        &self.kpi
    }

    /// Scalar fitness (higher is better).
    #[inline]
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    /// Whether every route with live work seated its head task when the
    /// solution was applied.
    #[inline]
    pub fn is_feasible(&self) -> bool {
        self.feasible
    }

    /// Number of assigned orders.
    pub fn assigned_count(&self) -> usize {
        self.assignment.len()
    }

    /// Vehicle assigned to an order, if any.
    pub fn vehicle_for(&self, order: OrderId) -> Option<VehicleId> {
        self.assignment.get(&order).copied()
    }

    /// Structural check: every order appears in exactly one route and the
    /// assignment map mirrors the routes.
    pub fn is_consistent(&self) -> bool {
        let mut seen = BTreeMap::new();
        for (&vehicle, route) in &self.routes {
            for &order in route {
                if seen.insert(order, vehicle).is_some() {
                    return false;
                }
            }
        }
        seen == self.assignment
    }
}
