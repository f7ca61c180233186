//! Warden Common Library
//!
//! Claim, token and rate limit rule types shared by the access control
//! server and any service that consumes its tokens.

pub mod types;

pub use types::*;
