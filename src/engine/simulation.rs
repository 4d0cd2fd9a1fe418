//! Discrete-time simulation engine.
//!
//! Advances the state tick by tick. The per-tick sequence is load-bearing
//! for determinism and must not be reordered:
//!
//! 1. Clock and shift bookkeeping, shift-handoff rotation
//! 2. Order ingestion (pull from the [`OrderSource`])
//! 3. Pending-order dispatch (weighted best-vehicle score)
//! 4. Vehicle advance (re-dispatch, axis-aligned motion, charging)
//! 5. Occupancy-grid rebuild
//! 6. Pairwise collision resolution (Euclidean, grid-pruned)
//! 7. Loading/unloading completion commits
//! 8. KPI snapshot
//!
//! Unassignable orders stay pending and late deliveries finish as `Late`;
//! neither is an error. Advancing a paused state is a no-op.

use std::cmp::Ordering;

use crate::config::SimulationConfig;
use crate::generator::OrderSource;
use crate::kpi::KpiSnapshot;
use crate::models::{Order, OrderId, OrderPriority, OrderStatus, Vehicle, VehicleId, VehicleState};

use super::state::SimulationState;

/// The time-stepped simulation engine.
///
/// Owns the configuration and the order source; all run state lives in the
/// [`SimulationState`] passed to each call, so one engine can drive many
/// independent states (the optimizer relies on this for its evaluation
/// clones).
#[derive(Debug)]
pub struct SimulationEngine<S> {
    config: SimulationConfig,
    source: S,
}

impl<S: OrderSource> SimulationEngine<S> {
    /// Creates an engine from a configuration and an order source.
    ///
    /// The configuration is expected to have passed
    /// [`SimulationConfig::validate`]; the engine does not re-validate
    /// mid-run.
    pub fn new(config: SimulationConfig, source: S) -> Self {
        Self { config, source }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Advances the simulation by `dt_min` (scaled by the state's time
    /// scale) and returns the tick's KPI snapshot.
    ///
    /// On a paused state this is a no-op: a snapshot of the unchanged
    /// state is returned and nothing is mutated.
    pub fn advance(&mut self, state: &mut SimulationState, dt_min: f64) -> KpiSnapshot {
        if state.paused {
            return KpiSnapshot::compute(
                &state.vehicles,
                &state.orders,
                state.clock_min,
                self.config.shift_length_min,
            );
        }
        let dt = dt_min * state.time_scale;

        // 1. Clock and shift bookkeeping.
        state.clock_min += dt;
        state.shift_index = (state.clock_min / self.config.shift_length_min) as u32;
        let into_shift = state.clock_min % self.config.shift_length_min;
        state.hour_of_shift = into_shift / 60.0;
        if state.shift_index > 0 && into_shift < self.config.handoff_window_min {
            self.shift_handoff(state);
        }

        // 2. Ingest new orders.
        let arrivals = self.source.orders_for_window(dt, state.clock_min);
        if !arrivals.is_empty() {
            tracing::debug!("{} orders arrived at {:.1} min", arrivals.len(), state.clock_min);
        }
        for order in arrivals {
            state.ingest(order);
        }

        // 3. Dispatch pending orders.
        self.assign_pending(state);

        // 4. Advance vehicles.
        self.advance_vehicles(state, dt);

        // 5. Rebuild the occupancy grid.
        state.grid.rebuild(&state.vehicles, self.config.safety_radius);

        // 6. Resolve collisions.
        self.resolve_collisions(state);

        // 7. Commit due loading/unloading completions.
        self.resolve_service(state, dt);

        // 8. KPI snapshot.
        let snapshot = KpiSnapshot::compute(
            &state.vehicles,
            &state.orders,
            state.clock_min,
            self.config.shift_length_min,
        );
        state.kpi_history.push(snapshot.clone());
        snapshot
    }

    /// Runs for `duration_min`, one snapshot per tick.
    pub fn run(&mut self, state: &mut SimulationState, duration_min: f64) -> Vec<KpiSnapshot> {
        self.run_with_hook(state, duration_min, |_| {})
    }

    /// Runs for `duration_min`, invoking `hook` with every tick snapshot.
    pub fn run_with_hook(
        &mut self,
        state: &mut SimulationState,
        duration_min: f64,
        mut hook: impl FnMut(&KpiSnapshot),
    ) -> Vec<KpiSnapshot> {
        let ticks = (duration_min / self.config.tick_min).round().max(0.0) as usize;
        let mut history = Vec::with_capacity(ticks);
        for _ in 0..ticks {
            let snapshot = self.advance(state, self.config.tick_min);
            hook(&snapshot);
            history.push(snapshot);
        }
        history
    }

    /// Restores a state to its just-created condition. Idempotent.
    pub fn reset(&self, state: &mut SimulationState) {
        state.clock_min = 0.0;
        state.shift_index = 0;
        state.hour_of_shift = 0.0;
        state.orders.clear();
        state.pending.clear();
        state.kpi_history.clear();
        state.grid.clear();
        state.paused = false;
        state.time_scale = self.config.time_scale;
        for vehicle in &mut state.vehicles {
            vehicle.reset(&self.config);
        }
    }

    // ======================== Tick stages ========================

    /// Rotates worn-down vehicles out at a shift boundary: anything under
    /// the handoff work threshold goes to charge, and its in-flight order
    /// returns to the pending queue with the assignment cleared.
    fn shift_handoff(&self, state: &mut SimulationState) {
        for i in 0..state.vehicles.len() {
            let vehicle = &state.vehicles[i];
            if matches!(
                vehicle.state(),
                VehicleState::Charging | VehicleState::Maintenance
            ) {
                continue;
            }
            if vehicle.work_remaining_min >= self.config.handoff_work_threshold_min {
                continue;
            }
            let released = state.vehicles[i].send_to_charge();
            if let Some(order_id) = released {
                state.order_mut(order_id).reset_to_pending();
                state.pending.push(order_id);
                tracing::debug!(
                    "shift handoff: vehicle {} rotated out, order {} back to pending",
                    i,
                    order_id
                );
            } else {
                tracing::debug!("shift handoff: vehicle {} rotated out", i);
            }
        }
    }

    /// Dispatch score of a feasible vehicle for an order: urgency bonus
    /// plus a bonus for less-utilized vehicles minus a normalized distance
    /// penalty. Higher is better.
    fn dispatch_score(&self, vehicle: &Vehicle, order: &Order, now_min: f64) -> f64 {
        let weights = &self.config.dispatch_weights;
        let urgency = if order.priority == OrderPriority::Urgent {
            1.0
        } else {
            0.0
        };
        let utilization_bonus = 1.0 - vehicle.utilization(now_min);
        let span = self.config.warehouse_width + self.config.warehouse_height;
        let distance = vehicle.position.manhattan_distance(order.pickup) / span;
        weights.urgency * urgency + weights.utilization * utilization_bonus
            - weights.distance * distance
    }

    /// Assigns pending orders, most important first (priority, then
    /// deadline, then id), each to the feasible vehicle with the best
    /// dispatch score. Orders with no feasible vehicle stay pending.
    fn assign_pending(&self, state: &mut SimulationState) {
        if state.pending.is_empty() {
            return;
        }
        let mut queue = state.pending.clone();
        queue.sort_by(|&a, &b| {
            let oa = state.order(a);
            let ob = state.order(b);
            oa.priority
                .cmp(&ob.priority)
                .then(
                    oa.deadline_min
                        .partial_cmp(&ob.deadline_min)
                        .unwrap_or(Ordering::Equal),
                )
                .then(a.cmp(&b))
        });

        let now = state.clock_min;
        let mut still_pending: Vec<OrderId> = Vec::new();
        for order_id in queue {
            let best = {
                let order = state.order(order_id);
                let mut best: Option<(f64, VehicleId)> = None;
                for vehicle in &state.vehicles {
                    if !vehicle.can_accept(order, &state.warehouse, &self.config) {
                        continue;
                    }
                    let score = self.dispatch_score(vehicle, order, now);
                    if best.map_or(true, |(best_score, _)| score > best_score) {
                        best = Some((score, vehicle.id));
                    }
                }
                best
            };
            match best {
                Some((_, vehicle_id)) => {
                    let order = &mut state.orders[order_id as usize];
                    let vehicle = &mut state.vehicles[vehicle_id as usize];
                    vehicle.assign_order(order);
                    tracing::debug!(
                        "order {} assigned to vehicle {} at {:.1} min",
                        order_id,
                        vehicle_id,
                        now
                    );
                }
                None => still_pending.push(order_id),
            }
        }
        state.pending = still_pending;
    }

    /// Advances every vehicle: yielded vehicles holding a task are
    /// re-dispatched first, then motion/idle/charging updates run with the
    /// scaled tick.
    fn advance_vehicles(&self, state: &mut SimulationState, dt: f64) {
        let now = state.clock_min;
        let output_dock = state.warehouse.output_dock;
        for i in 0..state.vehicles.len() {
            if state.vehicles[i].state() == VehicleState::Idle {
                if let Some(order_id) = state.vehicles[i].current_order() {
                    let target = match state.order(order_id).status() {
                        OrderStatus::Assigned => Some(state.order(order_id).pickup),
                        OrderStatus::InProgress => Some(output_dock),
                        _ => None,
                    };
                    if let Some(target) = target {
                        state.vehicles[i].resume(target);
                    }
                }
            }
            let (vehicles, orders) = (&mut state.vehicles, &state.orders);
            let vehicle = &mut vehicles[i];
            let task = vehicle.current_order().map(|id| &orders[id as usize]);
            vehicle.advance(dt, now, task, &self.config);
        }
    }

    /// Checks grid-candidate pairs with the exact Euclidean metric and
    /// forces the lower-priority vehicle of each conflicting pair to
    /// yield: urgent-task beats non-urgent, equal priority yields the
    /// larger id. One yield per conflict, no intra-tick fixed point.
    fn resolve_collisions(&self, state: &mut SimulationState) {
        let pairs = state.grid.candidate_pairs();
        for (a, b) in pairs {
            let va = &state.vehicles[a as usize];
            let vb = &state.vehicles[b as usize];
            let parked = |v: &Vehicle| {
                matches!(
                    v.state(),
                    VehicleState::Charging | VehicleState::Maintenance
                )
            };
            if parked(va) || parked(vb) {
                continue;
            }
            let distance = va.position.euclidean_distance(vb.position);
            if distance >= self.config.safety_radius {
                continue;
            }
            let urgent = |v: &Vehicle| {
                v.current_order()
                    .map(|id| state.order(id).priority == OrderPriority::Urgent)
                    .unwrap_or(false)
            };
            let (a_urgent, b_urgent) = (urgent(va), urgent(vb));
            let yielder = if a_urgent && !b_urgent {
                b
            } else if b_urgent && !a_urgent {
                a
            } else {
                // Equal priority: the larger numeric id yields.
                b
            };
            state.vehicles[yielder as usize].force_idle();
            tracing::debug!(
                "vehicles {} and {} within safety radius ({:.2}), vehicle {} yields",
                a,
                b,
                distance,
                yielder
            );
        }
    }

    /// Drains loading/unloading dwells and commits the ones due this tick:
    /// a finished load retargets the vehicle to the output dock, a
    /// finished unload finalizes the order as completed or late.
    fn resolve_service(&self, state: &mut SimulationState, dt: f64) {
        let now = state.clock_min;
        let output_dock = state.warehouse.output_dock;
        for i in 0..state.vehicles.len() {
            match state.vehicles[i].state() {
                VehicleState::Loading => {
                    if state.vehicles[i].drain_service(dt) {
                        if let Some(order_id) = state.vehicles[i].current_order() {
                            let order = &mut state.orders[order_id as usize];
                            state.vehicles[i].commit_loading(order, output_dock, &self.config);
                        }
                    }
                }
                VehicleState::Unloading => {
                    if state.vehicles[i].drain_service(dt) {
                        if let Some(order_id) = state.vehicles[i].current_order() {
                            let order = &mut state.orders[order_id as usize];
                            state.vehicles[i].commit_unloading(order, now);
                            tracing::debug!(
                                "order {} delivered {:?} at {:.1} min",
                                order_id,
                                order.status(),
                                now
                            );
                        }
                    }
                }
                _ => {}
            }
        }
    }
}
