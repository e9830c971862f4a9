use serde::{Deserialize, Serialize};

use crate::eligibility::StatusPolicy;
use crate::error::ConfigError;
use crate::scoring::ScoringConfig;

/// Tunables shared by every handler.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub statuses: StatusPolicy,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.statuses.validate()?;
        self.scoring.validate()
    }
}
