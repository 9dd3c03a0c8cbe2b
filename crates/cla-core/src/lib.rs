//! CLA Core: domain models, error types, repository traits and the
//! binding resolution algorithm shared by all crates.

pub mod email;
pub mod error;
pub mod models;
pub mod notification;
pub mod repository;
pub mod resolution;
