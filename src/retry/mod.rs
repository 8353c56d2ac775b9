//! Retry module
//! - policy.rs: cold-start re-attempt state machine for streaming requests

pub mod policy;

pub use policy::*;
