//! Core domain types
//!
//! The structures in this module are the snapshots the analysis service hands
//! back. They are shared between the transport (which decodes them) and the
//! tracker (which caches and fans them out to renderers).

pub mod assessment;
pub mod job;

pub(crate) mod serde_helpers;
