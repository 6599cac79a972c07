//! ARGUS Core - canonical data model for multi-INT fusion
//!
//! This crate provides the foundational primitives:
//! - The canonical Intel Record and its category/threat-level enums
//! - Deterministic record ids for idempotent ingestion
//! - Indicator (IOC/TTP) extraction from record text
//! - Engine configuration with startup validation

pub mod config;
pub mod error;
pub mod indicators;
pub mod record;

pub use config::*;
pub use error::*;
pub use indicators::*;
pub use record::*;

/// Confidence floor for any stored record
pub const MIN_CONFIDENCE: f64 = 0.0;

/// Confidence ceiling - corroboration can never push past this
pub const MAX_CONFIDENCE: f64 = 1.0;

/// Threat score range bounds
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;
