//! Variable Neighborhood Search over order→vehicle assignments.
//!
//! Treats the simulation engine plus KPI scorer as a black-box evaluation
//! oracle: every candidate is applied to a fresh clone of the base state,
//! simulated for a bounded horizon with no new arrivals, and scored by the
//! weighted KPI fitness.
//!
//! # Algorithm
//!
//! 1. Greedy initial construction (distance / load-balance / urgency score)
//! 2. Per outer iteration, walk the ascending shaking intensities:
//!    shake (one random operator), then first-improvement local search
//! 3. An improving candidate is adopted and the walk restarts at the
//!    smallest intensity; otherwise the next intensity is tried
//! 4. Stop after a no-improvement streak or the outer-iteration cap
//!
//! The best-known fitness is non-decreasing by construction. All
//! randomness flows through one seeded generator owned by the call, so a
//! seed fully reproduces a search; evaluations touch only their own state
//! clone, which keeps the door open for parallel candidate evaluation
//! behind a serialized best-solution register.
//!
//! # Reference
//! Mladenović & Hansen (1997), "Variable Neighborhood Search"

use rand::prelude::IndexedRandom;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, SimulationConfig};
use crate::engine::{SimulationEngine, SimulationState};
use crate::generator::EmptySource;
use crate::kpi::{KpiSnapshot, KpiWeights};
use crate::models::{Order, OrderId, OrderPriority, OrderStatus, VehicleId};

use super::operators;
use super::solution::{Routes, VnsSolution};

/// Search parameters for the VNS optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VnsConfig {
    /// Outer iteration cap.
    pub max_outer_iterations: u32,
    /// Stop after this many outer iterations without improvement.
    pub max_no_improvement: u32,
    /// Ascending shaking intensities walked per outer iteration.
    pub shaking_intensities: Vec<u32>,
    /// KPI fitness weights (must sum to 1).
    pub kpi_weights: KpiWeights,
    /// Bounded evaluation horizon per candidate (simulated minutes).
    pub evaluation_horizon_min: f64,
    /// Local-search pass cap.
    pub max_local_search_passes: u32,
    /// Seed for the search's random generator.
    pub seed: u64,
}

impl Default for VnsConfig {
    fn default() -> Self {
        Self {
            max_outer_iterations: 100,
            max_no_improvement: 20,
            shaking_intensities: vec![1, 2, 3, 5, 7, 10],
            kpi_weights: KpiWeights::default(),
            evaluation_horizon_min: 30.0,
            max_local_search_passes: 10,
            seed: 42,
        }
    }
}

impl VnsConfig {
    /// Sets the outer iteration cap.
    pub fn with_max_outer_iterations(mut self, cap: u32) -> Self {
        self.max_outer_iterations = cap;
        self
    }

    /// Sets the no-improvement stop threshold.
    pub fn with_max_no_improvement(mut self, cap: u32) -> Self {
        self.max_no_improvement = cap;
        self
    }

    /// Sets the shaking intensity sequence.
    pub fn with_intensities(mut self, intensities: Vec<u32>) -> Self {
        self.shaking_intensities = intensities;
        self
    }

    /// Sets the KPI weights.
    pub fn with_kpi_weights(mut self, weights: KpiWeights) -> Self {
        self.kpi_weights = weights;
        self
    }

    /// Sets the bounded evaluation horizon.
    pub fn with_horizon(mut self, minutes: f64) -> Self {
        self.evaluation_horizon_min = minutes;
        self
    }

    /// Sets the search seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Rejects ill-formed search parameters at configuration time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.kpi_weights.validate()?;
        if self.shaking_intensities.is_empty() {
            return Err(ConfigError::EmptyIntensities);
        }
        let ascending = self
            .shaking_intensities
            .windows(2)
            .all(|pair| pair[0] < pair[1]);
        if !ascending || self.shaking_intensities[0] == 0 {
            return Err(ConfigError::BadIntensities(self.shaking_intensities.clone()));
        }
        if self.max_outer_iterations == 0 {
            return Err(ConfigError::ZeroCap {
                field: "max_outer_iterations",
            });
        }
        if self.max_no_improvement == 0 {
            return Err(ConfigError::ZeroCap {
                field: "max_no_improvement",
            });
        }
        if self.max_local_search_passes == 0 {
            return Err(ConfigError::ZeroCap {
                field: "max_local_search_passes",
            });
        }
        if self.evaluation_horizon_min <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "evaluation_horizon_min",
                value: self.evaluation_horizon_min,
            });
        }
        Ok(())
    }
}

/// VNS optimizer over a simulation state.
#[derive(Debug, Clone)]
pub struct VnsOptimizer {
    sim_config: SimulationConfig,
    config: VnsConfig,
}

impl VnsOptimizer {
    /// Creates an optimizer, rejecting invalid configuration up front.
    pub fn new(sim_config: SimulationConfig, config: VnsConfig) -> Result<Self, ConfigError> {
        sim_config.validate()?;
        config.validate()?;
        Ok(Self { sim_config, config })
    }

    /// The search configuration.
    pub fn config(&self) -> &VnsConfig {
        &self.config
    }

    /// Runs the full search and returns the best solution found.
    pub fn optimize(&self, state: &SimulationState) -> VnsSolution {
        let mut rng = SmallRng::seed_from_u64(self.config.seed);
        let initial = self.initial_solution(state);
        tracing::debug!(
            "initial solution: fitness {:.4}, {} orders assigned",
            initial.fitness(),
            initial.assigned_count()
        );
        let mut current = initial.clone();
        let mut best = initial;
        let mut no_improvement = 0u32;

        for iteration in 0..self.config.max_outer_iterations {
            let mut improved = false;
            let mut level = 0usize;
            while level < self.config.shaking_intensities.len() {
                let intensity = self.config.shaking_intensities[level];
                let shaken = self.shake(state, &current, intensity, &mut rng);
                let candidate = self.local_search(state, shaken, &mut rng);
                if candidate.fitness() > current.fitness() {
                    tracing::debug!(
                        "iteration {}: fitness {:.4} -> {:.4} at intensity {}",
                        iteration,
                        current.fitness(),
                        candidate.fitness(),
                        intensity
                    );
                    if candidate.fitness() > best.fitness() {
                        best = candidate.clone();
                    }
                    current = candidate;
                    improved = true;
                    level = 0;
                } else {
                    level += 1;
                }
            }
            if improved {
                no_improvement = 0;
            } else {
                no_improvement += 1;
            }
            if no_improvement >= self.config.max_no_improvement {
                break;
            }
        }
        best
    }

    /// Greedy initial construction: live orders sorted by priority then
    /// deadline, each appended to the feasible vehicle with the best
    /// insertion score.
    pub fn initial_solution(&self, state: &SimulationState) -> VnsSolution {
        self.evaluate(state, self.construct_routes(state))
    }

    /// Applies a solution to a live state: every vehicle is cleared to
    /// idle, every non-terminal order reset to pending, then each route is
    /// walked and the vehicle takes its first feasible entry through the
    /// normal assignment contract. Remaining entries stay pending for
    /// engine dispatch. Returns whether every route with live work seated
    /// its head task.
    pub fn apply(&self, solution: &VnsSolution, state: &mut SimulationState) -> bool {
        apply_routes(state, solution.routes(), &self.sim_config)
    }

    // ======================== Construction ========================

    fn construct_routes(&self, state: &SimulationState) -> Routes {
        let mut routes: Routes = state.vehicle_ids().into_iter().map(|v| (v, Vec::new())).collect();
        let mut order_ids: Vec<OrderId> = state
            .orders
            .iter()
            .filter(|o| !o.is_terminal())
            .map(|o| o.id)
            .collect();
        order_ids.sort_by(|&a, &b| {
            let oa = state.order(a);
            let ob = state.order(b);
            oa.priority
                .cmp(&ob.priority)
                .then(
                    oa.deadline_min
                        .partial_cmp(&ob.deadline_min)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(a.cmp(&b))
        });
        for order_id in order_ids {
            if let Some(vehicle) = self.best_vehicle_for(state.order(order_id), &routes, state) {
                routes.entry(vehicle).or_default().push(order_id);
            }
        }
        routes
    }

    /// Construction / reinsertion score: proximity, load balance, urgency.
    fn best_vehicle_for(
        &self,
        order: &Order,
        routes: &Routes,
        state: &SimulationState,
    ) -> Option<VehicleId> {
        let weights = &self.sim_config.insertion_weights;
        let urgency = if order.priority == OrderPriority::Urgent {
            1.0
        } else {
            0.0
        };
        let mut best: Option<(f64, VehicleId)> = None;
        for vehicle in &state.vehicles {
            if !vehicle.route_feasible(order, &state.warehouse, &self.sim_config) {
                continue;
            }
            let distance = vehicle.position.manhattan_distance(order.pickup);
            let assigned = routes.get(&vehicle.id).map_or(0, Vec::len);
            let score = weights.distance * (1.0 / (1.0 + distance / 10.0))
                + weights.balance * (1.0 / (1.0 + assigned as f64 / 5.0))
                + weights.urgency * urgency;
            if best.map_or(true, |(best_score, _)| score > best_score) {
                best = Some((score, vehicle.id));
            }
        }
        best.map(|(_, vehicle)| vehicle)
    }

    fn reinsert(&self, mut routes: Routes, removed: Vec<OrderId>, state: &SimulationState) -> Routes {
        for order_id in removed {
            if let Some(vehicle) = self.best_vehicle_for(state.order(order_id), &routes, state) {
                routes.entry(vehicle).or_default().push(order_id);
            }
            // No feasible vehicle: the order is left unassigned and will
            // sit in the pending queue during evaluation.
        }
        routes
    }

    // ======================== Search ========================

    /// Evaluates candidate routes on a fresh clone of the base state:
    /// bounded-horizon simulation with no new arrivals, scored by the
    /// weighted KPI fitness.
    fn evaluate(&self, base: &SimulationState, routes: Routes) -> VnsSolution {
        let mut clone = base.clone();
        clone.paused = false;
        let feasible = apply_routes(&mut clone, &routes, &self.sim_config);
        let mut engine = SimulationEngine::new(self.sim_config.clone(), EmptySource);
        engine.run(&mut clone, self.config.evaluation_horizon_min);
        let kpi = match clone.kpi_history.last() {
            Some(snapshot) => snapshot.clone(),
            None => KpiSnapshot::compute(
                &clone.vehicles,
                &clone.orders,
                clone.clock_min,
                self.sim_config.shift_length_min,
            ),
        };
        let fitness = kpi.fitness(&self.config.kpi_weights);
        VnsSolution::new(routes, kpi, fitness, feasible)
    }

    /// First-improvement hill climbing: swap and insert at intensities
    /// 1..3, then one 2-opt per vehicle; adopts the first improving move
    /// and restarts, up to the pass cap.
    fn local_search<R: Rng>(
        &self,
        base: &SimulationState,
        mut current: VnsSolution,
        rng: &mut R,
    ) -> VnsSolution {
        for _ in 0..self.config.max_local_search_passes {
            match self.first_improvement(base, &current, rng) {
                Some(better) => current = better,
                None => break,
            }
        }
        current
    }

    fn first_improvement<R: Rng>(
        &self,
        base: &SimulationState,
        current: &VnsSolution,
        rng: &mut R,
    ) -> Option<VnsSolution> {
        let fleet = base.vehicle_ids();
        for k in 1..=3 {
            let candidate = self.evaluate(base, operators::swap_k(current.routes(), k, &fleet, rng));
            if candidate.fitness() > current.fitness() {
                return Some(candidate);
            }
            let (reduced, removed) = operators::remove_k(current.routes(), k, rng);
            let candidate = self.evaluate(base, self.reinsert(reduced, removed, base));
            if candidate.fitness() > current.fitness() {
                return Some(candidate);
            }
        }
        for (&vehicle, route) in current.routes() {
            if route.len() < 2 {
                continue;
            }
            let candidate = self.evaluate(base, operators::two_opt(current.routes(), vehicle, rng));
            if candidate.fitness() > current.fitness() {
                return Some(candidate);
            }
        }
        None
    }

    /// Shaking: one uniformly chosen perturbation at intensity `k`, not
    /// necessarily improving.
    fn shake<R: Rng>(
        &self,
        base: &SimulationState,
        current: &VnsSolution,
        k: u32,
        rng: &mut R,
    ) -> VnsSolution {
        let fleet = base.vehicle_ids();
        let routes = match rng.random_range(0..3) {
            0 => operators::swap_k(current.routes(), k, &fleet, rng),
            1 => {
                let (reduced, removed) = operators::remove_k(current.routes(), k, rng);
                self.reinsert(reduced, removed, base)
            }
            _ => {
                let loaded: Vec<VehicleId> = current
                    .routes()
                    .iter()
                    .filter(|(_, route)| route.len() >= 2)
                    .map(|(&vehicle, _)| vehicle)
                    .collect();
                match loaded.choose(rng) {
                    Some(&vehicle) => operators::two_opt(current.routes(), vehicle, rng),
                    None => current.routes().clone(),
                }
            }
        };
        self.evaluate(base, routes)
    }
}

/// Applies routes to a state: clears every vehicle, resets non-terminal
/// orders to pending, seats each route's first feasible entry, rebuilds
/// the pending queue. Returns whether every route with live work seated a
/// task.
fn apply_routes(state: &mut SimulationState, routes: &Routes, config: &SimulationConfig) -> bool {
    for vehicle in &mut state.vehicles {
        vehicle.clear_assignment();
    }
    for order in &mut state.orders {
        if !order.is_terminal() && order.status() != OrderStatus::Pending {
            order.reset_to_pending();
        }
    }
    for (&vehicle_id, route) in routes {
        for &order_id in route {
            let can = {
                let order = &state.orders[order_id as usize];
                order.status() == OrderStatus::Pending
                    && state.vehicles[vehicle_id as usize].can_accept(
                        order,
                        &state.warehouse,
                        config,
                    )
            };
            if can {
                let order = &mut state.orders[order_id as usize];
                let vehicle = &mut state.vehicles[vehicle_id as usize];
                vehicle.assign_order(order);
            }
        }
    }
    state.pending = state
        .orders
        .iter()
        .filter(|o| o.status() == OrderStatus::Pending)
        .map(|o| o.id)
        .collect();

    routes.iter().all(|(&vehicle_id, route)| {
        let live = route
            .iter()
            .any(|&order_id| !state.orders[order_id as usize].is_terminal());
        !live || state.vehicles[vehicle_id as usize].current_order().is_some()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{GeneratorConfig, OrderGenerator, OrderSource};
    use crate::models::WarehouseLayout;

    fn test_vns_config() -> VnsConfig {
        VnsConfig::default()
            .with_max_outer_iterations(3)
            .with_max_no_improvement(2)
            .with_intensities(vec![1, 2])
            .with_horizon(5.0)
    }

    fn seeded_state(order_count: usize, fleet: u32) -> SimulationState {
        let config = SimulationConfig::default();
        let mut state = SimulationState::new(&config, fleet);
        let layout = WarehouseLayout::generate(&config);
        let mut generator = OrderGenerator::new(GeneratorConfig::default(), layout, 42);
        // One 3-minute window at 20/hour is exactly one order.
        while state.orders.len() < order_count {
            for order in generator.orders_for_window(3.0, 0.0) {
                state.ingest(order);
            }
        }
        state
    }

    #[test]
    fn test_config_validation() {
        assert!(VnsConfig::default().validate().is_ok());

        let empty = VnsConfig::default().with_intensities(vec![]);
        assert_eq!(empty.validate(), Err(ConfigError::EmptyIntensities));

        let descending = VnsConfig::default().with_intensities(vec![3, 2, 1]);
        assert!(matches!(
            descending.validate(),
            Err(ConfigError::BadIntensities(_))
        ));

        let zero = VnsConfig::default().with_intensities(vec![0, 1]);
        assert!(matches!(zero.validate(), Err(ConfigError::BadIntensities(_))));

        let bad_weights = VnsConfig::default().with_kpi_weights(KpiWeights {
            idle: 0.9,
            utilization: 0.9,
            on_time: 0.9,
        });
        assert!(matches!(
            bad_weights.validate(),
            Err(ConfigError::KpiWeightSum { .. })
        ));

        let no_horizon = VnsConfig::default().with_horizon(0.0);
        assert!(matches!(
            no_horizon.validate(),
            Err(ConfigError::NonPositive { .. })
        ));

        let no_iterations = VnsConfig::default().with_max_outer_iterations(0);
        assert!(matches!(no_iterations.validate(), Err(ConfigError::ZeroCap { .. })));
    }

    #[test]
    fn test_optimizer_rejects_bad_config() {
        let bad = VnsConfig::default().with_intensities(vec![]);
        assert!(VnsOptimizer::new(SimulationConfig::default(), bad).is_err());
        assert!(VnsOptimizer::new(SimulationConfig::default(), test_vns_config()).is_ok());
    }

    #[test]
    fn test_initial_solution_assigns_greedily() {
        let state = seeded_state(8, 3);
        let optimizer =
            VnsOptimizer::new(SimulationConfig::default(), test_vns_config()).unwrap();
        let initial = optimizer.initial_solution(&state);

        assert!(initial.is_consistent());
        // Every order fits some vehicle in a fresh state.
        assert_eq!(initial.assigned_count(), 8);
        assert!(initial.is_feasible());
        assert!((0.0..=1.0).contains(&initial.fitness()));
    }

    #[test]
    fn test_optimize_never_below_initial() {
        let state = seeded_state(10, 3);
        let optimizer =
            VnsOptimizer::new(SimulationConfig::default(), test_vns_config()).unwrap();
        let initial = optimizer.initial_solution(&state);
        let best = optimizer.optimize(&state);

        assert!(best.fitness() >= initial.fitness() - 1e-9);
        assert!(best.is_consistent());
    }

    #[test]
    fn test_optimize_is_deterministic_under_seed() {
        let state = seeded_state(10, 3);
        let optimizer =
            VnsOptimizer::new(SimulationConfig::default(), test_vns_config()).unwrap();
        let a = optimizer.optimize(&state);
        let b = optimizer.optimize(&state);
        assert_eq!(a.routes(), b.routes());
        assert!((a.fitness() - b.fitness()).abs() < 1e-12);
    }

    #[test]
    fn test_evaluation_leaves_base_untouched() {
        let state = seeded_state(6, 2);
        let before_clock = state.clock_min;
        let before_orders = state.orders.len();
        let optimizer =
            VnsOptimizer::new(SimulationConfig::default(), test_vns_config()).unwrap();
        let _ = optimizer.optimize(&state);
        assert_eq!(state.clock_min, before_clock);
        assert_eq!(state.orders.len(), before_orders);
        for order in &state.orders {
            assert_eq!(order.status(), OrderStatus::Pending);
        }
    }

    #[test]
    fn test_apply_seats_route_heads() {
        let mut state = seeded_state(6, 3);
        let optimizer =
            VnsOptimizer::new(SimulationConfig::default(), test_vns_config()).unwrap();
        let solution = optimizer.initial_solution(&state);

        let feasible = optimizer.apply(&solution, &mut state);
        assert!(feasible);
        for (&vehicle_id, route) in solution.routes() {
            if route.is_empty() {
                continue;
            }
            let held = state.vehicle(vehicle_id).current_order();
            assert!(held.is_some());
            // The seated order belongs to this route and points back.
            let order_id = held.unwrap();
            assert!(route.contains(&order_id));
            assert_eq!(state.order(order_id).assigned_vehicle(), Some(vehicle_id));
            assert_eq!(state.order(order_id).status(), OrderStatus::Assigned);
        }
        // Everything else is pending.
        for order in &state.orders {
            if order.assigned_vehicle().is_none() {
                assert_eq!(order.status(), OrderStatus::Pending);
                assert!(state.pending.contains(&order.id));
            }
        }
    }

    #[test]
    fn test_apply_resets_in_flight_work() {
        let mut state = seeded_state(4, 2);
        let config = SimulationConfig::default();
        // Put the state mid-flight first.
        let mut engine = SimulationEngine::new(config.clone(), crate::generator::EmptySource);
        engine.run(&mut state, 2.0);

        let optimizer = VnsOptimizer::new(config, test_vns_config()).unwrap();
        let solution = optimizer.initial_solution(&state);
        optimizer.apply(&solution, &mut state);

        for order in &state.orders {
            assert!(
                order.is_terminal()
                    || matches!(order.status(), OrderStatus::Pending | OrderStatus::Assigned)
            );
        }
        for vehicle in &state.vehicles {
            assert!(vehicle.load_kg() < 1e-9);
        }
    }

    #[test]
    fn test_scenario_vns_never_regresses_greedy_distance() {
        // 5 vehicles, 50 seeded orders, 120-minute horizon: the optimized
        // solution must never produce more total distance than the greedy
        // construction (ties allowed).
        let sim_config = SimulationConfig::default();
        let mut base = SimulationState::new(&sim_config, 5);
        let layout = WarehouseLayout::generate(&sim_config);
        let mut generator = OrderGenerator::new(GeneratorConfig::default(), layout, 7);
        // 20/hour over one 150-minute window: exactly 50 orders at t=0.
        for order in generator.orders_for_window(150.0, 0.0) {
            base.ingest(order);
        }
        assert_eq!(base.orders.len(), 50);

        let vns_config = VnsConfig::default()
            .with_max_outer_iterations(3)
            .with_max_no_improvement(2)
            .with_intensities(vec![1, 2, 3])
            .with_horizon(10.0);
        let optimizer = VnsOptimizer::new(sim_config.clone(), vns_config).unwrap();

        let greedy = optimizer.initial_solution(&base);
        let best = optimizer.optimize(&base);
        assert!(best.fitness() >= greedy.fitness() - 1e-9);

        let run_distance = |solution: &VnsSolution| {
            let mut state = base.clone();
            optimizer.apply(solution, &mut state);
            let mut engine =
                SimulationEngine::new(sim_config.clone(), crate::generator::EmptySource);
            let history = engine.run(&mut state, 120.0);
            history.last().map(|kpi| kpi.total_distance).unwrap_or(0.0)
        };

        let greedy_distance = run_distance(&greedy);
        let vns_distance = run_distance(&best);
        assert!(
            vns_distance <= greedy_distance + 1e-6,
            "optimized distance {vns_distance} regressed over greedy {greedy_distance}"
        );
    }
}
