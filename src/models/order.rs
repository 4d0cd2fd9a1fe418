//! Pick-and-deliver order model.
//!
//! An order requests a set of items of one or more demand classes to be
//! picked from a storage slot and delivered to the output dock. Its status
//! walks a closed, forward-only state machine; terminal statuses and the
//! completion time are immutable once set.
//!
//! Unassignability and lateness are represented as order state, never as
//! errors: an order with no feasible vehicle simply stays pending, and a
//! delivery after its deadline completes as `Late`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::warehouse::{DemandClass, Point};
use super::vehicle::VehicleId;

/// Order identifier; equal to the order's index in the simulation arena.
pub type OrderId = u32;

/// Scheduling priority of an order.
///
/// The derived ordering (`Urgent < Normal < Low`) is the dispatch sort
/// order: ascending sorts put urgent orders first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderPriority {
    Urgent,
    Normal,
    Low,
}

/// Lifecycle status of an order.
///
/// Transitions only run `Pending → Assigned → InProgress → {Completed | Late}`.
/// The engine may reset a non-terminal order back to `Pending` (shift
/// handoff, solution application); terminal statuses never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Late,
}

impl OrderStatus {
    /// Whether the status is terminal.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Late)
    }
}

/// A pick-and-deliver order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier (index into the simulation's order arena).
    pub id: OrderId,
    /// Item composition: demand class → item count. Classes are unique by
    /// construction of the map.
    pub items: BTreeMap<DemandClass, u32>,
    /// Total payload weight (kg).
    pub weight_kg: f64,
    /// Total crate count.
    pub crates: u32,
    /// Scheduling priority.
    pub priority: OrderPriority,
    /// Creation time (simulated minutes).
    pub created_min: f64,
    /// Latest on-time delivery time (simulated minutes).
    pub deadline_min: f64,
    /// Pickup slot position.
    pub pickup: Point,
    status: OrderStatus,
    assigned_vehicle: Option<VehicleId>,
    completion_min: Option<f64>,
}

impl Order {
    /// Creates a pending order.
    pub fn new(id: OrderId, pickup: Point, weight_kg: f64, crates: u32) -> Self {
        Self {
            id,
            items: BTreeMap::new(),
            weight_kg,
            crates,
            priority: OrderPriority::Normal,
            created_min: 0.0,
            deadline_min: 0.0,
            pickup,
            status: OrderStatus::Pending,
            assigned_vehicle: None,
            completion_min: None,
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: OrderPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the creation time (minutes).
    pub fn with_created(mut self, created_min: f64) -> Self {
        self.created_min = created_min;
        self
    }

    /// Sets the deadline (minutes).
    pub fn with_deadline(mut self, deadline_min: f64) -> Self {
        self.deadline_min = deadline_min;
        self
    }

    /// Adds items of a demand class (classes stay unique; counts merge).
    pub fn with_items(mut self, class: DemandClass, count: u32) -> Self {
        *self.items.entry(class).or_insert(0) += count;
        self
    }

    /// Current status.
    #[inline]
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Vehicle currently holding this order, if any.
    #[inline]
    pub fn assigned_vehicle(&self) -> Option<VehicleId> {
        self.assigned_vehicle
    }

    /// Completion time, set exactly once at finalization.
    #[inline]
    pub fn completion_min(&self) -> Option<f64> {
        self.completion_min
    }

    /// Whether the order has reached a terminal status.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The demand class with the largest item count (pickup slot class).
    pub fn dominant_class(&self) -> Option<DemandClass> {
        self.items
            .iter()
            .max_by_key(|(_, &count)| count)
            .map(|(&class, _)| class)
    }

    /// Assigns the order to a vehicle: `Pending → Assigned`.
    ///
    /// # Panics
    /// On any other source status — an invalid transition is a programming
    /// defect, not a runtime condition.
    pub fn assign(&mut self, vehicle: VehicleId) {
        assert_eq!(
            self.status,
            OrderStatus::Pending,
            "order {} assigned while {:?}",
            self.id,
            self.status
        );
        self.status = OrderStatus::Assigned;
        self.assigned_vehicle = Some(vehicle);
    }

    /// Marks the pickup committed: `Assigned → InProgress`.
    pub fn start(&mut self) {
        assert_eq!(
            self.status,
            OrderStatus::Assigned,
            "order {} started while {:?}",
            self.id,
            self.status
        );
        self.status = OrderStatus::InProgress;
    }

    /// Finalizes the delivery: `InProgress → Completed` when on time,
    /// `InProgress → Late` otherwise. Sets the completion time exactly once.
    pub fn finalize(&mut self, now_min: f64) {
        assert_eq!(
            self.status,
            OrderStatus::InProgress,
            "order {} finalized while {:?}",
            self.id,
            self.status
        );
        self.status = if now_min <= self.deadline_min {
            OrderStatus::Completed
        } else {
            OrderStatus::Late
        };
        self.completion_min = Some(now_min);
    }

    /// Engine-level reset of a non-terminal order back to the pending queue
    /// (shift handoff, optimizer solution application). Clears the
    /// assignment.
    ///
    /// # Panics
    /// If the order is already terminal: terminal statuses are immutable.
    pub fn reset_to_pending(&mut self) {
        assert!(
            !self.is_terminal(),
            "order {} reset after terminal status {:?}",
            self.id,
            self.status
        );
        self.status = OrderStatus::Pending;
        self.assigned_vehicle = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_order() -> Order {
        Order::new(7, Point::new(10.0, 5.0), 6.0, 3)
            .with_priority(OrderPriority::Urgent)
            .with_created(12.0)
            .with_deadline(60.0)
            .with_items(DemandClass::A, 2)
            .with_items(DemandClass::B, 4)
    }

    #[test]
    fn test_order_builder() {
        let order = make_order();
        assert_eq!(order.id, 7);
        assert_eq!(order.priority, OrderPriority::Urgent);
        assert_eq!(order.items[&DemandClass::B], 4);
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.assigned_vehicle(), None);
    }

    #[test]
    fn test_dominant_class() {
        let order = make_order();
        assert_eq!(order.dominant_class(), Some(DemandClass::B));
        assert_eq!(Order::new(0, Point::default(), 1.0, 1).dominant_class(), None);
    }

    #[test]
    fn test_lifecycle_on_time() {
        let mut order = make_order();
        order.assign(3);
        assert_eq!(order.status(), OrderStatus::Assigned);
        assert_eq!(order.assigned_vehicle(), Some(3));
        order.start();
        assert_eq!(order.status(), OrderStatus::InProgress);
        order.finalize(55.0);
        assert_eq!(order.status(), OrderStatus::Completed);
        assert_eq!(order.completion_min(), Some(55.0));
        assert!(order.is_terminal());
    }

    #[test]
    fn test_lifecycle_late() {
        let mut order = make_order();
        order.assign(1);
        order.start();
        order.finalize(61.0);
        assert_eq!(order.status(), OrderStatus::Late);
    }

    #[test]
    fn test_reset_clears_assignment() {
        let mut order = make_order();
        order.assign(2);
        order.reset_to_pending();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.assigned_vehicle(), None);
        // Can be assigned again afterwards.
        order.assign(4);
        assert_eq!(order.assigned_vehicle(), Some(4));
    }

    #[test]
    #[should_panic(expected = "assigned while")]
    fn test_double_assign_panics() {
        let mut order = make_order();
        order.assign(1);
        order.assign(2);
    }

    #[test]
    #[should_panic(expected = "reset after terminal")]
    fn test_terminal_reset_panics() {
        let mut order = make_order();
        order.assign(1);
        order.start();
        order.finalize(10.0);
        order.reset_to_pending();
    }

    #[test]
    fn test_priority_sort_order() {
        let mut priorities = vec![OrderPriority::Low, OrderPriority::Urgent, OrderPriority::Normal];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![OrderPriority::Urgent, OrderPriority::Normal, OrderPriority::Low]
        );
    }

    #[test]
    fn test_order_serde_round_trip() {
        let order = make_order();
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, order.id);
        assert_eq!(back.status(), OrderStatus::Pending);
        assert_eq!(back.items, order.items);
    }
}
