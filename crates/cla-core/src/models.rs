//! Domain models for CLA bindings and signing records.

pub mod binding;
pub mod corporation;
pub mod individual;
pub mod manager;
pub mod signer;
