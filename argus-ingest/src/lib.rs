//! Ingestion pipeline for ARGUS
//!
//! Source Adapters produce domain-shaped raw items; the Normalizer maps
//! them into canonical Intel Records; the Deduplicator collapses exact and
//! near-duplicate reporting; the sweep runner drives all of it concurrently
//! with per-adapter all-or-nothing commits.

pub mod adapter;
pub mod dedup;
pub mod normalize;
pub mod sweep;

pub use adapter::*;
pub use dedup::*;
pub use normalize::*;
pub use sweep::*;
