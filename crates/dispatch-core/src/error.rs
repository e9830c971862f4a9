use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("status {0:?} is listed as both eligible and terminal")]
    OverlappingStatus(String),
    #[error("eligible status set is empty")]
    NoEligibleStatus,
    #[error("average speed must be a positive finite number (found: {0})")]
    InvalidSpeed(f64),
    #[error("{name} weight must be a non-negative finite number (found: {value})")]
    InvalidWeight { name: &'static str, value: f64 },
}
