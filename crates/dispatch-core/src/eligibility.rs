use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::DEFAULT_STATUS;

/// Whether an order belongs in the dispatch queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    Terminal,
    /// Not yet ready to queue (draft, unconfirmed, ...). Not an error.
    Ineligible,
}

/// Status vocabulary. Loaded from configuration; the defaults are the
/// in-progress and end states used by the restaurant apps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusPolicy {
    pub eligible: BTreeSet<String>,
    pub terminal: BTreeSet<String>,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            eligible: ["pending", "prepping", "ready", "en route"].into_iter().map(String::from).collect(),
            terminal: ["delivered", "canceled"].into_iter().map(String::from).collect(),
        }
    }
}

impl StatusPolicy {
    pub fn new<I, J, S, T>(eligible: I, terminal: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            eligible: eligible.into_iter().map(Into::into).collect(),
            terminal: terminal.into_iter().map(Into::into).collect(),
        }
    }

    /// Missing status classifies as [`DEFAULT_STATUS`]. Terminal is checked first.
    pub fn classify(&self, status: Option<&str>) -> Eligibility {
        let status = status.unwrap_or(DEFAULT_STATUS);
        if self.terminal.contains(status) {
            Eligibility::Terminal
        } else if self.eligible.contains(status) {
            Eligibility::Eligible
        } else {
            Eligibility::Ineligible
        }
    }

    pub fn is_eligible(&self, status: Option<&str>) -> bool {
        self.classify(status) == Eligibility::Eligible
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.eligible.is_empty() {
            return Err(ConfigError::NoEligibleStatus);
        }
        if let Some(s) = self.eligible.intersection(&self.terminal).next() {
            return Err(ConfigError::OverlappingStatus(s.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_vocabulary() {
        let p = StatusPolicy::default();
        assert_eq!(p.classify(Some("pending")), Eligibility::Eligible);
        assert_eq!(p.classify(Some("prepping")), Eligibility::Eligible);
        assert_eq!(p.classify(Some("ready")), Eligibility::Eligible);
        assert_eq!(p.classify(Some("en route")), Eligibility::Eligible);
        assert_eq!(p.classify(Some("delivered")), Eligibility::Terminal);
        assert_eq!(p.classify(Some("canceled")), Eligibility::Terminal);
        assert_eq!(p.classify(Some("draft")), Eligibility::Ineligible);
        assert_eq!(p.classify(Some("")), Eligibility::Ineligible);
    }

    #[test]
    fn missing_status_is_pending() {
        assert_eq!(StatusPolicy::default().classify(None), Eligibility::Eligible);
        // pending removed from the vocabulary: missing status follows it.
        let p = StatusPolicy::new(["ready"], ["delivered"]);
        assert_eq!(p.classify(None), Eligibility::Ineligible);
    }

    #[test]
    fn vocabulary_is_extensible() {
        let p = StatusPolicy::new(["pending", "completed"], ["delivered", "refunded"]);
        assert!(p.is_eligible(Some("completed")));
        assert_eq!(p.classify(Some("refunded")), Eligibility::Terminal);
    }

    #[test]
    fn overlapping_sets_rejected() {
        let p = StatusPolicy::new(["ready", "delivered"], ["delivered"]);
        assert_eq!(p.validate(), Err(ConfigError::OverlappingStatus("delivered".into())));
        let empty = StatusPolicy::new(Vec::<String>::new(), ["delivered"]);
        assert_eq!(empty.validate(), Err(ConfigError::NoEligibleStatus));
        assert!(StatusPolicy::default().validate().is_ok());
    }
}
