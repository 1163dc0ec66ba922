//! Data models for the topic enrollment portal.
//!
//! Field names on the wire match the shared store's documents (`taken`, `student1USN`, ...).

mod enrollment;
mod topic;
mod window;

pub use enrollment::*;
pub use topic::*;
pub use window::*;
