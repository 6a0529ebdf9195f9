//! Formula evaluation and weighted roll-up engine for organizational assessment scorecards.
//!
//! Data points feed assessment criteria (AC) through free-text formulas; criteria roll up into
//! performance signals (PS), key topics (KT) and an overall score. Everything runs on the
//! decimal scale: percentages are converted once when values are entered.

pub mod aggregation;
pub mod assessment;
pub mod config;
pub mod error;
pub mod formula;
pub mod hierarchy;
pub mod rating;
pub mod store;
pub mod telemetry;
