//! Input validation for simulation runs.
//!
//! Checks structural integrity of the fleet and order arena before a run.
//! Detects:
//! - Duplicate or index-mismatched ids
//! - Degenerate orders (zero weight, zero crates, deadline before creation)
//! - Positions outside the warehouse floor
//!
//! Runtime conditions — an order nothing can carry, a missed deadline —
//! are *not* validation errors; they are ordinary simulation data.

use std::collections::HashSet;

use crate::models::{Order, Vehicle, WarehouseLayout};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same id.
    DuplicateId,
    /// An entity's id does not match its arena index.
    IdIndexMismatch,
    /// A position lies outside the warehouse floor.
    OutOfBounds,
    /// An order that cannot describe real work.
    DegenerateOrder,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates the fleet and order arena against the layout.
///
/// Checks:
/// 1. Vehicle ids are unique and equal their roster index
/// 2. Order ids are unique and equal their arena index
/// 3. Vehicle homes and order pickups lie on the floor
/// 4. Orders carry positive weight, at least one crate, and a deadline at
///    or after their creation time
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_input(
    vehicles: &[Vehicle],
    orders: &[Order],
    layout: &WarehouseLayout,
) -> ValidationResult {
    let mut errors = Vec::new();

    let mut vehicle_ids = HashSet::new();
    for (index, vehicle) in vehicles.iter().enumerate() {
        if !vehicle_ids.insert(vehicle.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate vehicle id: {}", vehicle.id),
            ));
        }
        if vehicle.id as usize != index {
            errors.push(ValidationError::new(
                ValidationErrorKind::IdIndexMismatch,
                format!("Vehicle id {} at roster index {index}", vehicle.id),
            ));
        }
        if !layout.contains(vehicle.home) {
            errors.push(ValidationError::new(
                ValidationErrorKind::OutOfBounds,
                format!("Vehicle {} home lies off the floor", vehicle.id),
            ));
        }
    }

    let mut order_ids = HashSet::new();
    for (index, order) in orders.iter().enumerate() {
        if !order_ids.insert(order.id) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate order id: {}", order.id),
            ));
        }
        if order.id as usize != index {
            errors.push(ValidationError::new(
                ValidationErrorKind::IdIndexMismatch,
                format!("Order id {} at arena index {index}", order.id),
            ));
        }
        if !layout.contains(order.pickup) {
            errors.push(ValidationError::new(
                ValidationErrorKind::OutOfBounds,
                format!("Order {} pickup lies off the floor", order.id),
            ));
        }
        if order.weight_kg <= 0.0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::DegenerateOrder,
                format!("Order {} has non-positive weight", order.id),
            ));
        }
        if order.crates == 0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::DegenerateOrder,
                format!("Order {} has zero crates", order.id),
            ));
        }
        if order.deadline_min < order.created_min {
            errors.push(ValidationError::new(
                ValidationErrorKind::DegenerateOrder,
                format!("Order {} deadline precedes its creation", order.id),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::models::{Point, Vehicle};

    fn layout() -> WarehouseLayout {
        WarehouseLayout::generate(&SimulationConfig::default())
    }

    fn sample_vehicles() -> Vec<Vehicle> {
        let config = SimulationConfig::default();
        vec![
            Vehicle::new(0, Point::new(1.0, 2.0), &config),
            Vehicle::new(1, Point::new(1.0, 3.5), &config),
        ]
    }

    fn sample_orders() -> Vec<Order> {
        vec![
            Order::new(0, Point::new(10.0, 10.0), 4.0, 2)
                .with_created(0.0)
                .with_deadline(60.0),
            Order::new(1, Point::new(12.0, 8.0), 2.0, 1)
                .with_created(5.0)
                .with_deadline(90.0),
        ]
    }

    #[test]
    fn test_valid_input() {
        assert!(validate_input(&sample_vehicles(), &sample_orders(), &layout()).is_ok());
    }

    #[test]
    fn test_duplicate_vehicle_id() {
        let config = SimulationConfig::default();
        let vehicles = vec![
            Vehicle::new(0, Point::new(1.0, 2.0), &config),
            Vehicle::new(0, Point::new(1.0, 3.5), &config),
        ];
        let errors = validate_input(&vehicles, &[], &layout()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::DuplicateId));
    }

    #[test]
    fn test_order_id_index_mismatch() {
        let orders = vec![Order::new(5, Point::new(10.0, 10.0), 4.0, 2).with_deadline(60.0)];
        let errors = validate_input(&sample_vehicles(), &orders, &layout()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::IdIndexMismatch));
    }

    #[test]
    fn test_out_of_bounds_pickup() {
        let orders = vec![Order::new(0, Point::new(999.0, 10.0), 4.0, 2).with_deadline(60.0)];
        let errors = validate_input(&sample_vehicles(), &orders, &layout()).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.kind == ValidationErrorKind::OutOfBounds));
    }

    #[test]
    fn test_degenerate_orders() {
        let orders = vec![
            Order::new(0, Point::new(10.0, 10.0), 0.0, 2).with_deadline(60.0), // no weight
            Order::new(1, Point::new(10.0, 10.0), 4.0, 0).with_deadline(60.0), // no crates
            Order::new(2, Point::new(10.0, 10.0), 4.0, 2)
                .with_created(100.0)
                .with_deadline(60.0), // deadline before creation
        ];
        let errors = validate_input(&sample_vehicles(), &orders, &layout()).unwrap_err();
        let degenerate = errors
            .iter()
            .filter(|e| e.kind == ValidationErrorKind::DegenerateOrder)
            .count();
        assert_eq!(degenerate, 3);
    }

    #[test]
    fn test_multiple_errors_collected() {
        let config = SimulationConfig::default();
        let vehicles = vec![Vehicle::new(3, Point::new(-5.0, 2.0), &config)];
        let orders = vec![Order::new(9, Point::new(10.0, 10.0), 0.0, 1).with_deadline(60.0)];
        let errors = validate_input(&vehicles, &orders, &layout()).unwrap_err();
        assert!(errors.len() >= 4);
    }
}
