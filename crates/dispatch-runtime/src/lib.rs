//! Configuration, the in-process delivery substrate and scenario replay.

pub mod config;
pub mod runtime;
pub mod scenario;
pub mod script;
pub mod substrate;

pub use config::*;
pub use runtime::*;
pub use script::*;
pub use substrate::*;
