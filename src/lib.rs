//! spotwatch - playlist subscription sync and notification pipeline.
//!
//! This crate polls a remote playlist API on behalf of subscribed users,
//! detects newly added tracks since the last check, records each addition as
//! a deduplicated activity, and sends one aggregated email notification per
//! updated subscription.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod notifier;
pub mod remote;
pub mod repository;
pub mod service;
pub mod task;
