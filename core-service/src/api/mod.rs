//! API Module
//!
//! Operations the presentation layer calls into. Transport (HTTP routing,
//! form parsing) lives in the web crate.

pub mod commands;

pub use commands::*;
