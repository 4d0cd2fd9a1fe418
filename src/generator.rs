//! Stochastic order source.
//!
//! Orders arrive through the [`OrderSource`] trait: the engine pulls
//! `orders_for_window` once per tick — ingestion is a pull at tick start,
//! never an awaited push. [`OrderGenerator`] samples arrivals, sizes,
//! priorities, and demand classes from configured distributions and is
//! fully deterministic under a caller-supplied seed: the generator owns a
//! seeded [`SmallRng`] and no call path touches an implicit global
//! generator.

use rand::prelude::IndexedRandom;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::models::{DemandClass, Order, OrderId, OrderPriority, WarehouseLayout};

/// Producer of newly arrived orders, pulled by the engine each tick.
pub trait OrderSource {
    /// Orders arriving during the window `[now_min - dt_min, now_min]`.
    fn orders_for_window(&mut self, dt_min: f64, now_min: f64) -> Vec<Order>;
}

/// A source that never produces orders.
///
/// Used for the optimizer's bounded-horizon evaluation clones: candidates
/// are judged on the known backlog, not on invented future arrivals.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySource;

impl OrderSource for EmptySource {
    fn orders_for_window(&mut self, _dt_min: f64, _now_min: f64) -> Vec<Order> {
        Vec::new()
    }
}

/// Distribution parameters for the order generator.
///
/// Indexed arrays follow [`DemandClass::ALL`] order (A, B, C) for class
/// parameters and urgent/normal/low order for priority parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Mean order arrivals per simulated hour.
    pub arrival_rate_per_hour: f64,
    /// Maximum distinct demand classes per order.
    pub max_classes_per_order: u32,
    /// Maximum item count per class line.
    pub max_items_per_class: u32,
    /// Items packed into one crate.
    pub items_per_crate: u32,
    /// Item unit weight (kg) per demand class.
    pub unit_weight_kg: [f64; 3],
    /// Probability of an urgent order.
    pub urgent_share: f64,
    /// Probability of a low-priority order.
    pub low_share: f64,
    /// Demand-class mix of the first class line per order.
    pub class_mix: [f64; 3],
    /// Base deadline slack (minutes) for urgent/normal/low orders; jittered
    /// uniformly by ±20%/+30% at sampling time.
    pub deadline_slack_min: [f64; 3],
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            arrival_rate_per_hour: 20.0,
            max_classes_per_order: 2,
            max_items_per_class: 3,
            items_per_crate: 2,
            unit_weight_kg: [2.5, 1.5, 0.8],
            urgent_share: 0.15,
            low_share: 0.20,
            class_mix: [0.5, 0.3, 0.2],
            deadline_slack_min: [45.0, 120.0, 240.0],
        }
    }
}

impl GeneratorConfig {
    /// Rejects ill-formed distributions at configuration time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arrival_rate_per_hour < 0.0 {
            return Err(ConfigError::Negative {
                field: "arrival_rate_per_hour",
                value: self.arrival_rate_per_hour,
            });
        }
        if self.items_per_crate == 0 {
            return Err(ConfigError::ZeroCap {
                field: "items_per_crate",
            });
        }
        let mix: f64 = self.class_mix.iter().sum();
        if (mix - 1.0).abs() > 1e-6 {
            return Err(ConfigError::DistributionSum {
                field: "class_mix",
                sum: mix,
            });
        }
        let priority_rest = 1.0 - self.urgent_share - self.low_share;
        if !(0.0..=1.0).contains(&priority_rest) {
            return Err(ConfigError::DistributionSum {
                field: "priority shares",
                sum: self.urgent_share + self.low_share,
            });
        }
        Ok(())
    }
}

fn class_index(class: DemandClass) -> usize {
    match class {
        DemandClass::A => 0,
        DemandClass::B => 1,
        DemandClass::C => 2,
    }
}

/// Seeded order generator sampling from the configured distributions.
///
/// Pickup slots are resolved against the layout with
/// [`WarehouseLayout::nearest_slot`] for the order's dominant class.
#[derive(Debug, Clone)]
pub struct OrderGenerator {
    config: GeneratorConfig,
    layout: WarehouseLayout,
    rng: SmallRng,
    next_id: OrderId,
}

impl OrderGenerator {
    /// Creates a generator. The same seed over the same layout always
    /// produces the same order stream.
    pub fn new(config: GeneratorConfig, layout: WarehouseLayout, seed: u64) -> Self {
        Self {
            config,
            layout,
            rng: SmallRng::seed_from_u64(seed),
            next_id: 0,
        }
    }

    fn sample_priority(&mut self) -> OrderPriority {
        let r: f64 = self.rng.random_range(0.0..1.0);
        if r < self.config.urgent_share {
            OrderPriority::Urgent
        } else if r < self.config.urgent_share + self.config.low_share {
            OrderPriority::Low
        } else {
            OrderPriority::Normal
        }
    }

    fn sample_first_class(&mut self) -> DemandClass {
        let r: f64 = self.rng.random_range(0.0..1.0);
        if r < self.config.class_mix[0] {
            DemandClass::A
        } else if r < self.config.class_mix[0] + self.config.class_mix[1] {
            DemandClass::B
        } else {
            DemandClass::C
        }
    }

    fn sample_order(&mut self, now_min: f64) -> Order {
        let class_count = self
            .rng
            .random_range(1..=self.config.max_classes_per_order.max(1));

        let mut classes = vec![self.sample_first_class()];
        while classes.len() < class_count as usize {
            let remaining: Vec<DemandClass> = DemandClass::ALL
                .iter()
                .copied()
                .filter(|c| !classes.contains(c))
                .collect();
            match remaining.choose(&mut self.rng) {
                Some(&c) => classes.push(c),
                None => break,
            }
        }

        let mut total_items = 0u32;
        let mut weight_kg = 0.0;
        let mut lines = Vec::with_capacity(classes.len());
        for &class in &classes {
            let count = self.rng.random_range(1..=self.config.max_items_per_class.max(1));
            total_items += count;
            weight_kg += count as f64 * self.config.unit_weight_kg[class_index(class)];
            lines.push((class, count));
        }
        let crates = total_items.div_ceil(self.config.items_per_crate).max(1);

        let priority = self.sample_priority();
        let slack_index = match priority {
            OrderPriority::Urgent => 0,
            OrderPriority::Normal => 1,
            OrderPriority::Low => 2,
        };
        let jitter: f64 = self.rng.random_range(0.8..1.3);
        let deadline = now_min + self.config.deadline_slack_min[slack_index] * jitter;

        let id = self.next_id;
        self.next_id += 1;

        let mut order = Order::new(id, self.layout.input_dock, weight_kg, crates)
            .with_priority(priority)
            .with_created(now_min)
            .with_deadline(deadline);
        for (class, count) in lines {
            order = order.with_items(class, count);
        }
        if let Some(class) = order.dominant_class() {
            if let Some(slot) = self.layout.nearest_slot(class, crates) {
                order.pickup = slot.position;
            }
        }
        order
    }
}

impl OrderSource for OrderGenerator {
    fn orders_for_window(&mut self, dt_min: f64, now_min: f64) -> Vec<Order> {
        let expected = self.config.arrival_rate_per_hour * dt_min / 60.0;
        let mut count = expected.floor() as u32;
        if self.rng.random_bool((expected - expected.floor()).clamp(0.0, 1.0)) {
            count += 1;
        }
        (0..count).map(|_| self.sample_order(now_min)).collect()
    }
}
