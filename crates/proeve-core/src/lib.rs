//! Core types and trait definitions for the Proeve assessment workflow.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod aanvraag;
pub mod catalogus;
pub mod cursus;
pub mod error;
pub mod event;
pub mod leercoach;
pub mod onderdeel;
pub mod status;
pub mod store;
pub mod voorwaarden;

pub use aanvraag::Handeling;
pub use error::{Error, ErrorKind, Result};
