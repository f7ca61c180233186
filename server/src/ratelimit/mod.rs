//! Rate limiting module for protecting against abuse.
//!
//! Sliding-window quotas per identifier and named rule, with a timed block
//! once a quota is exceeded. State lives in the shared cache store.

pub mod config;
pub mod constants;
pub mod error;
pub mod ip;
pub mod limiter;
pub mod middleware;
pub mod types;

pub use config::*;
pub use constants::*;
pub use error::*;
pub use ip::*;
pub use limiter::*;
pub use middleware::{rate_limit_by_ip, with_rule};
pub use types::*;
