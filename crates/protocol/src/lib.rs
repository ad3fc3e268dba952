//! Data types exchanged with the camera capture-session device.
//!
//! This crate contains the serde-serializable shapes that cross the boundary
//! between the frame server and the low-level capture session: request
//! descriptors, per-frame results and failures, and the identifiers used to
//! correlate them.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond construction, lookup and (de)serialization
//! * Device-shaped: Match what a capture session accepts and reports
//! * Stable: Changes only when the device contract changes
//!
//! Arbitration, dispatch and listener plumbing live in `frame-server`.

pub mod keys;
pub mod request;
pub mod result;
pub mod types;

pub use keys::Key;
pub use request::*;
pub use result::*;
pub use types::*;
