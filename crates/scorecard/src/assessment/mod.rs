//! Assessment sessions: calculation runs over a linked hierarchy, reports, versioned
//! snapshots and the HTTP surface.
//!
//! The engine is pure: it reads a [`ValueSource`](crate::store::ValueSource) and a set of
//! overrides and returns an [`AssessmentResult`]. The service owns per-assessment state and
//! persists it through an [`AssessmentRepository`].

mod engine;
pub mod json_store;
pub mod report;
pub mod repository;
mod result;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use engine::{AssessmentEngine, Overrides};
pub use json_store::JsonFileRepository;
pub use report::{write_csv, AssessmentReport, AssessmentReportView};
pub use repository::{
    AssessmentId, AssessmentRecord, AssessmentRepository, AssessmentSnapshot,
    AssessmentSummaryView, RepositoryError,
};
pub use result::{AssessmentResult, CriterionOverride, CriterionResult, OverallResult, RollupResult};
pub use router::assessment_router;
pub use service::{AssessmentService, AssessmentServiceError, NewAssessment, SnapshotSummary};
