//! Data Transfer Objects
//!
//! Wire shapes returned by the analysis service that are not themselves
//! domain snapshots: list pages and the lightweight status payload.

pub mod job;
