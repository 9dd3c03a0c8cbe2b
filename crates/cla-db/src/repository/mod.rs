//! SurrealDB repository implementations.

mod binding;
mod ledger;
mod manager;
mod rows;

pub use binding::SurrealBindingRepository;
pub use ledger::SurrealSignerLedger;
pub use manager::SurrealCorporationManagerRepository;
