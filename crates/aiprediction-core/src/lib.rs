//! AI Prediction Core - Shared types for the prediction API bridge
//!
//! This crate provides the pieces every other crate builds on:
//! - Error taxonomy
//! - API configuration and credentials
//! - Date identifiers (YYMMDD) and year disambiguation
//! - Summaries of last-elements snapshots

pub mod config;
pub mod date;
pub mod error;
pub mod snapshot;

pub use config::{ApiConfig, Credentials, DEFAULT_BASE_URL};
pub use date::{normalize, resolve_year, DateId};
pub use error::{Error, Result};
pub use snapshot::SnapshotSummary;
