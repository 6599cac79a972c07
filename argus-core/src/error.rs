//! Shared error types
//!
//! Each crate carries its own thiserror enum for its boundary; only the
//! validation error is shared because both ingestion and the store write
//! path enforce the same record invariants.

use thiserror::Error;

/// A raw item failed normalization or a record violates a core invariant.
///
/// Validation failures are dropped from the sweep and counted, never fatal.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required field for {category}: {field}")]
    MissingField {
        category: &'static str,
        field: &'static str,
    },

    #[error("geolocation unresolvable for {category} (mandatory for this category)")]
    Unresolvable { category: &'static str },

    #[error("coordinates out of range: lat {lat}, lon {lon}")]
    BadCoordinates { lat: f64, lon: f64 },

    #[error("threat level {level} does not match banding of score {score}")]
    BandingMismatch { level: String, score: f64 },

    #[error("field out of range: {field} = {value}")]
    OutOfRange { field: &'static str, value: f64 },
}
