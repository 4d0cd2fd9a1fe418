//! Simulation state arena.
//!
//! Everything one simulation run owns: the layout, the fleet, the order
//! arena, the pending queue, the clock, and the KPI history. Vehicles and
//! orders are addressed by integer id equal to their index in the arena
//! vectors, which keeps the per-evaluation `Clone` the optimizer relies on
//! cheap — no deep object graph, just vector copies.
//!
//! The state is mutated only through engine operations; the optimizer
//! works on ephemeral clones and discards them after scoring.

use crate::config::{KpiTargets, SimulationConfig};
use crate::kpi::KpiSnapshot;
use crate::models::{Order, OrderId, Point, Vehicle, VehicleId, WarehouseLayout};

use super::collision::OccupancyGrid;

/// Complete state of one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationState {
    /// Read-only floor plan.
    pub warehouse: WarehouseLayout,
    /// Fleet roster; index == vehicle id.
    pub vehicles: Vec<Vehicle>,
    /// Order arena; index == order id.
    pub orders: Vec<Order>,
    /// Ids of orders waiting for a vehicle.
    pub pending: Vec<OrderId>,
    /// Simulated clock (monotonic minutes).
    pub clock_min: f64,
    /// Current shift index (two 12-hour shifts per operating day).
    pub shift_index: u32,
    /// Hours elapsed within the current shift.
    pub hour_of_shift: f64,
    /// Collision occupancy grid, rebuilt every tick.
    pub grid: OccupancyGrid,
    /// KPI snapshot per tick.
    pub kpi_history: Vec<KpiSnapshot>,
    /// Performance targets the run is judged against.
    pub targets: KpiTargets,
    /// Simulation speed multiplier.
    pub time_scale: f64,
    /// When set, `advance` is a no-op.
    pub paused: bool,
}

impl SimulationState {
    /// Creates a fresh state: generated layout, `fleet_size` idle vehicles
    /// parked in a staggered column by the west wall, no orders.
    pub fn new(config: &SimulationConfig, fleet_size: u32) -> Self {
        let warehouse = WarehouseLayout::generate(config);
        let vehicles = (0..fleet_size)
            .map(|id| {
                let home = Point::new(1.0, 2.0 + id as f64 * 1.5);
                Vehicle::new(id, home, config)
            })
            .collect();
        let grid = OccupancyGrid::new(
            config.warehouse_width,
            config.warehouse_height,
            config.grid_size,
        );
        Self {
            warehouse,
            vehicles,
            orders: Vec::new(),
            pending: Vec::new(),
            clock_min: 0.0,
            shift_index: 0,
            hour_of_shift: 0.0,
            grid,
            kpi_history: Vec::new(),
            targets: config.targets,
            time_scale: config.time_scale,
            paused: false,
        }
    }

    /// Appends an order to the arena and the pending queue, issuing its id.
    ///
    /// Ids are always the arena index; whatever id the source put on the
    /// order is overwritten.
    pub fn ingest(&mut self, mut order: Order) -> OrderId {
        let id = self.orders.len() as OrderId;
        order.id = id;
        self.orders.push(order);
        self.pending.push(id);
        id
    }

    /// Order by id.
    #[inline]
    pub fn order(&self, id: OrderId) -> &Order {
        &self.orders[id as usize]
    }

    /// Mutable order by id.
    #[inline]
    pub fn order_mut(&mut self, id: OrderId) -> &mut Order {
        &mut self.orders[id as usize]
    }

    /// Vehicle by id.
    #[inline]
    pub fn vehicle(&self, id: VehicleId) -> &Vehicle {
        &self.vehicles[id as usize]
    }

    /// Ids of all vehicles, in id order.
    pub fn vehicle_ids(&self) -> Vec<VehicleId> {
        (0..self.vehicles.len() as VehicleId).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderStatus;

    #[test]
    fn test_new_state() {
        let config = SimulationConfig::default();
        let state = SimulationState::new(&config, 5);
        assert_eq!(state.vehicles.len(), 5);
        assert!(state.orders.is_empty());
        assert!(state.pending.is_empty());
        assert_eq!(state.clock_min, 0.0);
        assert!(!state.paused);
        // Homes are staggered and on the floor.
        for v in &state.vehicles {
            assert!(state.warehouse.contains(v.home));
        }
        assert_eq!(state.vehicle_ids(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_ingest_issues_arena_ids() {
        let config = SimulationConfig::default();
        let mut state = SimulationState::new(&config, 2);
        let order = Order::new(99, Point::new(5.0, 5.0), 2.0, 1);
        let id = state.ingest(order);
        assert_eq!(id, 0);
        assert_eq!(state.order(0).id, 0);
        assert_eq!(state.order(0).status(), OrderStatus::Pending);
        assert_eq!(state.pending, vec![0]);

        let id2 = state.ingest(Order::new(0, Point::new(6.0, 6.0), 2.0, 1));
        assert_eq!(id2, 1);
    }

    #[test]
    fn test_clone_is_independent() {
        let config = SimulationConfig::default();
        let mut state = SimulationState::new(&config, 2);
        state.ingest(Order::new(0, Point::new(5.0, 5.0), 2.0, 1));

        let mut snapshot = state.clone();
        snapshot.order_mut(0).assign(1);
        snapshot.clock_min = 99.0;

        assert_eq!(state.order(0).status(), OrderStatus::Pending);
        assert_eq!(state.clock_min, 0.0);
    }
}
