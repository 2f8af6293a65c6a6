//! Infrastructure layer implementations.

pub mod ledger;
pub mod notification;
pub mod wallet;

pub use ledger::{GatewayConfig, GatewayLedgerClient, SimulatedLedgerClient, SimulatedLedgerConfig};
pub use notification::{InMemoryNotificationSurface, TracingNotificationSurface};
pub use wallet::{LocalKeyWallet, signing_key_from_base58};
