//! Shared types: errors and destination addresses

pub mod addr;
pub mod error;

pub use addr::{Addr, Network};
pub use error::{Error, Result};
