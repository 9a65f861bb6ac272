//! Logic Module - poller, dispatcher, cache and their collaborators
//!
//! ## Layout
//! - `record` / `storage` - records and the per-source tables holding them
//! - `detector` - newest-record selection and the last-processed watermark
//! - `dispatcher` - bounded-concurrency classification cycles
//! - `cache` - latest-state snapshot and its refresh task
//! - `model` / `collector` - classifier and resource sampling collaborators
//! - `simulator` - concurrent source generator

pub mod cache;
pub mod collector;
pub mod config;
pub mod detector;
pub mod dispatcher;
pub mod model;
pub mod poll_loop;
pub mod record;
pub mod simulator;
pub mod storage;
