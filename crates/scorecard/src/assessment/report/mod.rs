mod export;
mod summary;
pub mod views;

pub use export::write_csv;
pub use summary::AssessmentReport;
pub use views::{
    AssessmentReportView, ExecutiveSummary, ImprovementArea, PillarBreakdown, PillarTopic,
    RatingCounts, Recommendation, StatusCounts,
};
