// src/jobs/mod.rs
//! Rate-limited background image jobs.

pub mod orchestrator;
pub mod rate_limit;
pub mod store;

pub use orchestrator::{ImageJobRunner, SAFETY_MARGIN};
pub use rate_limit::RateLimiter;
pub use store::{Job, JobCounts, JobStatus, JobStore};
