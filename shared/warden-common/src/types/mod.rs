//! Shared Types

mod rule;
mod token;

pub use rule::{RateLimitRule, MAX_RULE_DURATION_MS};
pub use token::{ClaimSet, TokenPair, TokenPayload, TokenType};
