//! Transaction lifecycle coordinator.
//!
//! Drives state-changing actions against an external ledger through a
//! single-threaded lifecycle per call site (submit, await confirmation,
//! resolve) with one notification per attempt, rule-based error
//! classification, and a fixed-width identifier codec.

pub mod api;
pub mod app;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
