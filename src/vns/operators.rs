//! Route surgery operators for the VNS neighborhoods.
//!
//! Pure transformations over the route representation: each returns a
//! fresh [`Routes`] value, leaving the input untouched. Feasibility is not
//! pre-checked here — a bad move simply evaluates poorly and is rejected
//! by the search. Scoring-aware reinsertion lives in the optimizer, which
//! knows the state.
//!
//! Every operator takes an explicit `&mut R: Rng`; nothing draws from an
//! implicit shared generator.

use rand::prelude::IndexedRandom;
use rand::Rng;

use crate::models::{OrderId, VehicleId};

use super::solution::Routes;

/// All assigned orders, in deterministic route order.
pub fn assigned_orders(routes: &Routes) -> Vec<OrderId> {
    routes.values().flatten().copied().collect()
}

/// Swap-k: moves `k` randomly chosen assigned orders each to a different
/// randomly chosen vehicle (appended to that vehicle's route).
pub fn swap_k<R: Rng>(routes: &Routes, k: u32, fleet: &[VehicleId], rng: &mut R) -> Routes {
    let mut result = routes.clone();
    let orders = assigned_orders(routes);
    if orders.is_empty() || fleet.len() < 2 {
        return result;
    }
    let picks: Vec<OrderId> = orders
        .choose_multiple(rng, (k as usize).min(orders.len()))
        .copied()
        .collect();
    for order in picks {
        let Some(from) = route_of(&result, order) else {
            continue;
        };
        let candidates: Vec<VehicleId> = fleet.iter().copied().filter(|&v| v != from).collect();
        if let Some(&to) = candidates.choose(rng) {
            remove_order(&mut result, order);
            result.entry(to).or_default().push(order);
        }
    }
    result
}

/// Removes `k` randomly chosen assigned orders, returning the reduced
/// routes and the removed ids (in removal order, for reinsertion).
pub fn remove_k<R: Rng>(routes: &Routes, k: u32, rng: &mut R) -> (Routes, Vec<OrderId>) {
    let mut result = routes.clone();
    let orders = assigned_orders(routes);
    let removed: Vec<OrderId> = orders
        .choose_multiple(rng, (k as usize).min(orders.len()))
        .copied()
        .collect();
    for &order in &removed {
        remove_order(&mut result, order);
    }
    (result, removed)
}

/// 2-opt: reverses a random sub-sequence `[i, j]` of one vehicle's route.
pub fn two_opt<R: Rng>(routes: &Routes, vehicle: VehicleId, rng: &mut R) -> Routes {
    let mut result = routes.clone();
    if let Some(route) = result.get_mut(&vehicle) {
        if route.len() >= 2 {
            let mut i = rng.random_range(0..route.len());
            let mut j = rng.random_range(0..route.len());
            if i > j {
                std::mem::swap(&mut i, &mut j);
            }
            route[i..=j].reverse();
        }
    }
    result
}

/// Vehicle currently routing an order.
pub fn route_of(routes: &Routes, order: OrderId) -> Option<VehicleId> {
    routes
        .iter()
        .find(|(_, route)| route.contains(&order))
        .map(|(&vehicle, _)| vehicle)
}

fn remove_order(routes: &mut Routes, order: OrderId) {
    for route in routes.values_mut() {
        route.retain(|&o| o != order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn sample_routes() -> Routes {
        let mut routes = Routes::new();
        routes.insert(0, vec![0, 1, 2]);
        routes.insert(1, vec![3, 4]);
        routes.insert(2, vec![]);
        routes
    }

    fn sorted_orders(routes: &Routes) -> Vec<OrderId> {
        let mut orders = assigned_orders(routes);
        orders.sort();
        orders
    }

    #[test]
    fn test_swap_preserves_order_set() {
        let routes = sample_routes();
        let mut rng = SmallRng::seed_from_u64(42);
        for k in 1..=5 {
            let swapped = swap_k(&routes, k, &[0, 1, 2], &mut rng);
            assert_eq!(sorted_orders(&swapped), vec![0, 1, 2, 3, 4]);
        }
        // The input is untouched.
        assert_eq!(routes, sample_routes());
    }

    #[test]
    fn test_swap_moves_to_a_different_vehicle() {
        let mut routes = Routes::new();
        routes.insert(0, vec![7]);
        routes.insert(1, vec![]);
        let mut rng = SmallRng::seed_from_u64(1);
        let swapped = swap_k(&routes, 1, &[0, 1], &mut rng);
        assert_eq!(route_of(&swapped, 7), Some(1));
    }

    #[test]
    fn test_swap_single_vehicle_is_identity() {
        let mut routes = Routes::new();
        routes.insert(0, vec![1, 2]);
        let mut rng = SmallRng::seed_from_u64(3);
        assert_eq!(swap_k(&routes, 2, &[0], &mut rng), routes);
    }

    #[test]
    fn test_remove_k() {
        let routes = sample_routes();
        let mut rng = SmallRng::seed_from_u64(42);
        let (reduced, removed) = remove_k(&routes, 2, &mut rng);
        assert_eq!(removed.len(), 2);
        assert_eq!(assigned_orders(&reduced).len(), 3);
        for order in &removed {
            assert_eq!(route_of(&reduced, *order), None);
        }
    }

    #[test]
    fn test_remove_more_than_assigned() {
        let routes = sample_routes();
        let mut rng = SmallRng::seed_from_u64(42);
        let (reduced, removed) = remove_k(&routes, 99, &mut rng);
        assert_eq!(removed.len(), 5);
        assert!(assigned_orders(&reduced).is_empty());
    }

    #[test]
    fn test_two_opt_reverses_within_route() {
        let mut routes = Routes::new();
        routes.insert(0, vec![0, 1, 2, 3, 4]);
        let mut rng = SmallRng::seed_from_u64(42);
        let reversed = two_opt(&routes, 0, &mut rng);
        // Same elements, same vehicle.
        assert_eq!(sorted_orders(&reversed), vec![0, 1, 2, 3, 4]);
        assert_eq!(reversed.len(), 1);
    }

    #[test]
    fn test_two_opt_short_route_is_identity() {
        let mut routes = Routes::new();
        routes.insert(0, vec![9]);
        let mut rng = SmallRng::seed_from_u64(42);
        assert_eq!(two_opt(&routes, 0, &mut rng), routes);
        assert_eq!(two_opt(&routes, 5, &mut rng), routes);
    }

    #[test]
    fn test_route_of() {
        let routes = sample_routes();
        assert_eq!(route_of(&routes, 4), Some(1));
        assert_eq!(route_of(&routes, 99), None);
    }
}
