//! Background sweeps for courier.
//!
//! The engine has no external job queue; every periodic concern is an
//! in-process interval loop over a [`SweepExecutor`]:
//!
//! - **Pending**: dispatch notifications whose time has come
//! - **Retry**: re-dispatch failed notifications after their cool-down
//! - **Expiry**: cancel pending notifications past their deadline
//! - **Campaigns**: promote scheduled campaigns, close finished ones
//! - **Cleanup**: drop terminal rows past the retention window

pub mod scheduler;

pub use scheduler::{SchedulerConfig, SweepExecutor, run_scheduler};
