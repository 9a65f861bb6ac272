//! SkyWatch core: change-detection poller, classification dispatcher and
//! latest-state cache over per-source record tables.

pub mod api;
pub mod constants;
pub mod error;
pub mod logic;

pub use error::{Error, Result};
