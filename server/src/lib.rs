//! Warden Server
//!
//! Access control core: signed session tokens and sliding-window rate
//! limiting, served over a thin axum gate.

pub mod admin;
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod ratelimit;

#[cfg(test)]
mod redis_tests;
