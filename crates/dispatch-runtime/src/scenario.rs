use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use dispatch_core::{FixedClock, Order, OrderId, OrderKey, QueueItem, RestaurantId, Subtree};
use serde::Deserialize;

use crate::config::Config;
use crate::runtime::Runtime;
use crate::script::load_script;
use crate::substrate::{DeadLetter, DeliveryStats};

const FLOAT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Deserialize)]
pub struct ScenarioExpected {
    pub scenario_id: String,
    #[serde(default)]
    pub dead_letters: usize,
    #[serde(default)]
    pub min_retried: u64,
    #[serde(default)]
    pub min_duplicates: u64,
    #[serde(default)]
    pub queue: BTreeMap<OrderId, ItemExpectation>,
    #[serde(default)]
    pub active: BTreeMap<OrderId, ItemExpectation>,
    #[serde(default)]
    pub absent_queue: Vec<OrderId>,
    #[serde(default)]
    pub absent_active: Vec<OrderId>,
    #[serde(default)]
    pub orders: Vec<OrderExpectation>,
    /// Leading order ids of the ranked queue.
    #[serde(default)]
    pub ranking: Vec<OrderId>,
}

/// Fields left out are not checked.
#[derive(Debug, Default, Deserialize)]
pub struct ItemExpectation {
    pub restaurant_id: Option<RestaurantId>,
    pub status: Option<String>,
    pub address: Option<String>,
    pub priority: Option<f64>,
    pub created_at_ms: Option<i64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct OrderExpectation {
    pub restaurant_id: RestaurantId,
    pub order_id: OrderId,
    pub status: Option<String>,
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug)]
pub struct ScenarioResult {
    pub queue: BTreeMap<OrderId, QueueItem>,
    pub active: BTreeMap<OrderId, QueueItem>,
    pub orders: BTreeMap<OrderKey, Order>,
    pub ranking: Vec<OrderId>,
    pub stats: DeliveryStats,
    pub dead_letters: Vec<DeadLetter>,
}

pub fn load_expected(dir: &Path) -> Result<ScenarioExpected> {
    let p = dir.join("expected.yaml");
    let s = std::fs::read_to_string(&p).with_context(|| format!("read expected.yaml: {}", p.display()))?;
    let exp: ScenarioExpected = serde_yaml::from_str(&s).with_context(|| "parse expected.yaml")?;
    Ok(exp)
}

/// Replays `events.yaml` from a scenario directory against fresh in-memory
/// stores. A `dispatch.toml` beside it overrides the default config.
pub async fn simulate(dir: &Path) -> Result<ScenarioResult> {
    let cfg = Config::load_or_default(&Config::default_path(dir))?;
    let script = load_script(&dir.join("events.yaml"))?;
    let mut rt = Runtime::in_memory(&cfg, Arc::new(FixedClock::new(script.start_ms)))?;
    script.run(&mut rt).await?;

    Ok(ScenarioResult {
        queue: rt.items(Subtree::Queue)?,
        active: rt.items(Subtree::Active)?,
        orders: rt.orders()?,
        ranking: rt.ranked_queue()?.into_iter().map(|(id, _)| id).collect(),
        stats: rt.stats(),
        dead_letters: rt.dead_letters().to_vec(),
    })
}

/// Every way `result` differs from `exp`. Empty means the scenario passed.
pub fn check(exp: &ScenarioExpected, result: &ScenarioResult) -> Vec<String> {
    let mut problems = Vec::new();

    if result.dead_letters.len() != exp.dead_letters {
        problems.push(format!(
            "dead letters: expected {}, got {}",
            exp.dead_letters,
            result.dead_letters.len()
        ));
    }
    if result.stats.retried < exp.min_retried {
        problems.push(format!("retried: expected at least {}, got {}", exp.min_retried, result.stats.retried));
    }
    if result.stats.duplicates < exp.min_duplicates {
        problems.push(format!(
            "duplicates: expected at least {}, got {}",
            exp.min_duplicates, result.stats.duplicates
        ));
    }

    for (subtree, expected, actual, absent) in [
        ("queue", &exp.queue, &result.queue, &exp.absent_queue),
        ("active", &exp.active, &result.active, &exp.absent_active),
    ] {
        for (id, want) in expected {
            match actual.get(id) {
                Some(item) => check_item(&format!("/{subtree}/{id}"), want, item, &mut problems),
                None => problems.push(format!("/{subtree}/{id}: missing")),
            }
        }
        for id in absent {
            if actual.contains_key(id) {
                problems.push(format!("/{subtree}/{id}: expected absent"));
            }
        }
    }

    for want in &exp.orders {
        let key = OrderKey::new(want.restaurant_id.clone(), want.order_id.clone());
        let Some(order) = result.orders.get(&key) else {
            problems.push(format!("{key}: missing"));
            continue;
        };
        let at = key.to_string();
        field(&at, "status", &want.status, &order.status, &mut problems);
        field(&at, "address", &want.address, &order.address, &mut problems);
        float(&at, "lat", want.lat, order.lat, &mut problems);
        float(&at, "lng", want.lng, order.lng, &mut problems);
    }

    if !result.ranking.starts_with(&exp.ranking) {
        problems.push(format!("ranking: expected prefix {:?}, got {:?}", exp.ranking, result.ranking));
    }

    problems
}

fn check_item(at: &str, want: &ItemExpectation, item: &QueueItem, problems: &mut Vec<String>) {
    field(at, "restaurantId", &want.restaurant_id, &item.restaurant_id, problems);
    field(at, "status", &want.status, &item.status, problems);
    field(at, "address", &want.address, &item.address, problems);
    field(at, "createdAtMs", &want.created_at_ms, &item.created_at_ms, problems);
    float(at, "priority", want.priority, item.priority, problems);
    float(at, "lat", want.lat, item.lat, problems);
    float(at, "lng", want.lng, item.lng, problems);
}

fn field<T: PartialEq + std::fmt::Debug>(
    at: &str,
    name: &str,
    want: &Option<T>,
    got: &Option<T>,
    problems: &mut Vec<String>,
) {
    if let Some(want) = want {
        if got.as_ref() != Some(want) {
            problems.push(format!("{at}.{name}: expected {want:?}, got {got:?}"));
        }
    }
}

fn float(at: &str, name: &str, want: Option<f64>, got: Option<f64>, problems: &mut Vec<String>) {
    if let Some(want) = want {
        let ok = got.is_some_and(|g| (g - want).abs() <= FLOAT_TOLERANCE);
        if !ok {
            problems.push(format!("{at}.{name}: expected {want}, got {got:?}"));
        }
    }
}
