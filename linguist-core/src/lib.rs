//! Linguist core library: analyzer, result store, staleness policy, scheduler,
//! and the query facade used by the HTTP layer.
//!
//! The main entry points are [`scheduler::Scheduler`], which keeps the
//! [`store::ResultStore`] populated on a recurring tick, and
//! [`query::QueryFacade`], which serves cached results to readers.

pub mod analyze;
pub mod catalog;
pub mod classify;
pub mod clock;
pub mod config;
pub mod error;
pub mod fetch;
pub mod progress;
pub mod query;
pub mod scheduler;
pub mod service;
pub mod staleness;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;
