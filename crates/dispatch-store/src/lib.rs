//! Interfaces to the two external stores and in-memory implementations of both.

pub mod error;
pub mod feed;
pub mod memory;
pub mod traits;

pub use error::*;
pub use feed::*;
pub use memory::*;
pub use traits::*;
