//! Event handlers keeping the dispatch queue consistent with the order store.
//!
//! - [`OrderSync`]: order create/update → queue membership and geo stamp
//! - [`PrioritySweep`]: agent position → queue priorities
//! - [`ReverseStatusSync`]: queue/active status → order status
//!
//! Field ownership keeps concurrent handlers from conflicting: only the sweep
//! writes `priority`, only `OrderSync` writes address/coordinates, only the
//! reverse sync writes status onto orders.

pub mod error;
pub mod handlers;
pub mod order_sync;
pub mod outcome;
pub mod reverse;
pub mod sweep;

pub use error::*;
pub use handlers::*;
pub use order_sync::*;
pub use outcome::*;
pub use reverse::*;
pub use sweep::*;
