//! dailyprep-core: Domain model, store traits, and daily-practice logic.
//!
//! This crate defines the rows the app stores, the async seams to the hosted
//! services, and the jobs that run on top of them: daily question assignment,
//! submissions and streaks, push dispatch, answer evaluation, and the feed.

pub mod assign;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod feed;
pub mod model;
pub mod push;
pub mod submission;
pub mod traits;
