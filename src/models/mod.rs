//! Core data models for the capability-URL object manager.
//!
//! Wire shapes (`BucketEntry`, the deletion index document) derive `serde`
//! and are validated at the deserialization boundary. Derived shapes
//! (`VisibleNode`, `Listing`) are rebuilt on every reconciliation.

pub mod deletion;
pub mod node;
pub mod object;
pub mod settings;
pub mod status;
pub mod upload;
