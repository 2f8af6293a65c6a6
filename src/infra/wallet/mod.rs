//! Wallet providers.

pub mod local;

pub use local::{LocalKeyWallet, signing_key_from_base58};
