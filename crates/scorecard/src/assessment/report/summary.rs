use std::cmp::Ordering;

use super::views::{
    AssessmentReportView, ExecutiveSummary, ImprovementArea, PillarBreakdown, PillarTopic,
    RatingCounts, Recommendation, StatusCounts,
};
use crate::aggregation::Aggregator;
use crate::assessment::result::{AssessmentResult, RollupResult};
use crate::hierarchy::Hierarchy;
use crate::rating::{Rating, RatingClassifier};

/// Read-only reporting over one calculation result.
#[derive(Debug, Clone, Copy)]
pub struct AssessmentReport<'a> {
    hierarchy: &'a Hierarchy,
    result: &'a AssessmentResult,
    classifier: RatingClassifier,
    aggregator: Aggregator,
}

impl<'a> AssessmentReport<'a> {
    pub fn new(hierarchy: &'a Hierarchy, result: &'a AssessmentResult) -> Self {
        Self {
            hierarchy,
            result,
            classifier: RatingClassifier::default(),
            aggregator: Aggregator::default(),
        }
    }

    pub fn summary(&self) -> ExecutiveSummary {
        let mut criteria = RatingCounts::default();
        let mut statuses = StatusCounts::default();
        let mut overridden = 0;
        for result in &self.result.criteria {
            criteria.record(result.rating);
            statuses.record(result.status);
            if result.overridden {
                overridden += 1;
            }
        }

        let mut signals = RatingCounts::default();
        for result in &self.result.signals {
            signals.record(result.rating);
        }
        let mut key_topics = RatingCounts::default();
        for result in &self.result.key_topics {
            key_topics.record(result.rating);
        }

        ExecutiveSummary {
            overall: self.result.overall.value,
            rating: self.result.overall.rating,
            rating_label: self.result.overall.rating.label(),
            criteria,
            signals,
            key_topics,
            statuses,
            overridden,
            calculated_at: self.result.calculated_at,
        }
    }

    /// Key topics that need attention: Needs Improvement first, then Satisfactory, lowest
    /// value first within each band.
    pub fn recommendations(&self) -> Vec<Recommendation> {
        let mut flagged: Vec<&RollupResult> = self
            .result
            .key_topics
            .iter()
            .filter(|topic| {
                matches!(
                    topic.rating,
                    Rating::NeedsImprovement | Rating::Satisfactory
                )
            })
            .collect();
        flagged.sort_by(|left, right| {
            band_priority(left.rating)
                .cmp(&band_priority(right.rating))
                .then_with(|| compare_values(left.value, right.value))
        });

        flagged
            .into_iter()
            .map(|topic| {
                let weakest_signal = self
                    .result
                    .signals_for_topic(&topic.name)
                    .filter_map(|signal| signal.value.map(|value| (signal, value)))
                    .min_by(|left, right| left.1.total_cmp(&right.1))
                    .map(|(signal, _)| signal.name.clone());
                let focus = weakest_signal.as_deref().unwrap_or(topic.name.as_str());
                let action = match topic.rating {
                    Rating::NeedsImprovement => format!("Prioritise corrective action on {focus}"),
                    _ => format!("Strengthen {focus} to reach Good"),
                };
                Recommendation {
                    key_topic: topic.name.clone(),
                    pillar: topic.parent.clone(),
                    value: topic.value,
                    rating: topic.rating,
                    rating_label: topic.rating.label(),
                    weakest_signal,
                    action,
                }
            })
            .collect()
    }

    /// Criteria rated Needs Improvement, heaviest first.
    pub fn improvement_areas(&self) -> Vec<ImprovementArea> {
        let mut areas: Vec<ImprovementArea> = self
            .result
            .criteria
            .iter()
            .filter(|result| result.rating == Rating::NeedsImprovement)
            .map(|result| ImprovementArea {
                criterion: result.name.clone(),
                performance_signal: result.performance_signal.clone(),
                key_topic: self
                    .hierarchy
                    .signal(&result.performance_signal)
                    .map(|signal| signal.key_topic.clone())
                    .unwrap_or_default(),
                weight: result.weight,
                value: result.value,
                rating_label: result.rating.label(),
            })
            .collect();
        areas.sort_by(|left, right| {
            right
                .weight
                .total_cmp(&left.weight)
                .then_with(|| left.value.total_cmp(&right.value))
        });
        areas
    }

    /// Unweighted mean of key topic values per pillar, in definition order.
    pub fn pillar_breakdown(&self) -> Vec<PillarBreakdown> {
        self.hierarchy
            .pillars()
            .into_iter()
            .map(|pillar| {
                let key_topics: Vec<PillarTopic> = self
                    .hierarchy
                    .key_topics()
                    .iter()
                    .filter(|topic| topic.pillar == pillar)
                    .map(|topic| {
                        let result = self.result.key_topic(&topic.name);
                        PillarTopic {
                            name: topic.name.clone(),
                            value: result.and_then(|result| result.value),
                            rating: result.map_or(Rating::Unknown, |result| result.rating),
                        }
                    })
                    .collect();
                let values: Vec<Option<f64>> = key_topics.iter().map(|topic| topic.value).collect();
                let value = self.aggregator.overall(&values).value;
                let rating = value.map_or(Rating::Unknown, |value| {
                    self.classifier.default_band(value)
                });
                PillarBreakdown {
                    pillar: pillar.to_string(),
                    value,
                    rating,
                    rating_label: rating.label(),
                    key_topics,
                }
            })
            .collect()
    }

    pub fn view(&self) -> AssessmentReportView {
        AssessmentReportView {
            summary: self.summary(),
            recommendations: self.recommendations(),
            improvement_areas: self.improvement_areas(),
            pillars: self.pillar_breakdown(),
        }
    }
}

fn band_priority(rating: Rating) -> u8 {
    match rating {
        Rating::NeedsImprovement => 0,
        Rating::Satisfactory => 1,
        Rating::Good => 2,
        Rating::Unknown => 3,
    }
}

fn compare_values(left: Option<f64>, right: Option<f64>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => left.total_cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
