//! Assessment engine for ARGUS
//!
//! Read-side of the fusion pipeline: the threat scorer derives per-record
//! and aggregate scores, the alert-level resolver maps aggregates onto a
//! five-level posture with hysteresis, and the assessment synthesizer
//! drives the inference backend through a multi-stage prompt pipeline into
//! a structured SITREP with graceful degradation.

pub mod alert;
pub mod backend;
pub mod score;
pub mod sitrep;
pub mod synthesize;

pub use alert::*;
pub use backend::*;
pub use score::*;
pub use sitrep::*;
pub use synthesize::*;
