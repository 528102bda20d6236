//! Slidegate - Distributed Sliding-Window Rate Limiting
//!
//! This crate bounds how many operations a subject may perform within a
//! trailing time window across any number of processes. Window state lives
//! in a shared Redis instance and every admission decision is a single
//! atomic script execution against it.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod verification;
