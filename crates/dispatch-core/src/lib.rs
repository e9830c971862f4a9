//! Domain types and pure logic for the dispatch queue: ids, records,
//! eligibility, projection and geo scoring.

pub mod config;
pub mod eligibility;
pub mod error;
pub mod events;
pub mod ids;
pub mod model;
pub mod projection;
pub mod scoring;
pub mod time;

pub use config::*;
pub use eligibility::*;
pub use error::*;
pub use events::*;
pub use ids::*;
pub use model::*;
pub use projection::*;
pub use scoring::*;
pub use time::*;
