//! CLA Signing: individual, corporation and employee signing flows on
//! top of the binding store, with notification fan-out.

pub mod config;
pub mod error;
pub mod notification;
pub mod service;

pub use config::SigningConfig;
pub use error::SigningError;
pub use notification::LogNotificationSink;
pub use service::{BindingSignings, CorporationActor, SigningService};
