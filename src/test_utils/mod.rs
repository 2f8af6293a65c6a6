//! Scripted collaborators for unit and integration tests.

pub mod mocks;

pub use mocks::{
    ConfirmBehavior, MockConfig, MockLedgerClient, MockWallet, RecordingNotificationSurface,
    SurfaceOp,
};
