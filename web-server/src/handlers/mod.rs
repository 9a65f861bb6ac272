//! HTTP handlers

pub mod health;
pub mod images;
pub mod classify;
pub mod removal;
pub mod stats;
