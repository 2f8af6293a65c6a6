//! Ledger client implementations.
//!
//! An HTTP gateway client for real deployments and a simulated ledger for
//! local runs without one.

pub mod http;
pub mod simulated;

pub use http::{GatewayConfig, GatewayLedgerClient};
pub use simulated::{SimulatedLedgerClient, SimulatedLedgerConfig};
