//! Learner dashboard rollups.
//!
//! Everything here is derived per request from the store; nothing is cached.

#![warn(missing_docs)]

pub mod summary;

pub use summary::{
    BasicDashboard, CourseSummary, Dashboard, DashboardSummary, Deadline,
};
