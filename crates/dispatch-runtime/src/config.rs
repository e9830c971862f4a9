use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use dispatch_core::{DispatchConfig, ScoringConfig, StatusPolicy};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub statuses: StatusPolicy,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

/// How the in-process substrate redelivers events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Attempts per event before it is dead-lettered.
    pub max_attempts: u32,
    /// Wait before retry N (1-based); the last entry repeats.
    pub backoff_ms: Vec<u64>,
    /// Deliver every event twice, to exercise idempotency.
    pub duplicate_deliveries: bool,
    /// Upper bound on events handled by one drain. Guards against update loops.
    pub max_events: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_ms: vec![0, 50, 200],
            duplicate_deliveries: false,
            max_events: 10_000,
        }
    }
}

impl DeliveryConfig {
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let idx = (retry.max(1) - 1) as usize;
        let ms = self
            .backoff_ms
            .get(idx)
            .or_else(|| self.backoff_ms.last())
            .copied()
            .unwrap_or(0);
        Duration::from_millis(ms)
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let s = toml::to_string_pretty(self).with_context(|| "serialize toml")?;
        std::fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.dispatch().validate().context("invalid dispatch config")?;
        anyhow::ensure!(self.delivery.max_attempts >= 1, "delivery.max_attempts must be at least 1");
        anyhow::ensure!(self.delivery.max_events >= 1, "delivery.max_events must be at least 1");
        Ok(())
    }

    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            statuses: self.statuses.clone(),
            scoring: self.scoring.clone(),
        }
    }

    pub fn default_path(root: &Path) -> PathBuf {
        root.join("dispatch.toml")
    }
}
