use serde::Serialize;
use tracing::info;

use super::{Hierarchy, Level};

const EXPECTED_TOTAL: f64 = 100.0;
const TOLERANCE: f64 = 0.1;

/// Sibling weights under one parent that do not add up to 100.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightIssue {
    /// Level of the children whose weights are summed.
    pub level: Level,
    pub parent: String,
    pub total: f64,
    pub children: usize,
}

impl Hierarchy {
    /// Sibling groups whose weights differ from 100. Totals are tolerated by the aggregator;
    /// this is an audit aid only.
    pub fn weight_issues(&self) -> Vec<WeightIssue> {
        let mut issues = Vec::new();
        for topic in self.key_topics() {
            let weights: Vec<f64> = self
                .signals_for_topic(topic)
                .map(|signal| signal.weight)
                .collect();
            if let Some(issue) = audit(Level::PerformanceSignal, &topic.name, &weights) {
                issues.push(issue);
            }
        }
        for signal in self.signals() {
            let weights: Vec<f64> = self
                .criteria_for_signal(signal)
                .map(|criterion| criterion.weight)
                .collect();
            if let Some(issue) = audit(Level::AssessmentCriterion, &signal.name, &weights) {
                issues.push(issue);
            }
        }
        issues
    }

    /// Scale every unbalanced sibling group to sum to 100; all-zero groups are split evenly.
    /// Returns the groups that were adjusted.
    pub fn rebalance_weights(&mut self) -> Vec<WeightIssue> {
        let issues = self.weight_issues();
        for issue in &issues {
            match issue.level {
                Level::PerformanceSignal => {
                    let Some(topic) = self.key_topic(&issue.parent) else {
                        continue;
                    };
                    let names = topic.signals.clone();
                    for signal in self.signals_mut() {
                        if names.contains(&signal.name) {
                            signal.weight = rebalanced(signal.weight, issue);
                        }
                    }
                }
                Level::AssessmentCriterion => {
                    for criterion in self.criteria_mut() {
                        if criterion.performance_signal == issue.parent {
                            criterion.weight = rebalanced(criterion.weight, issue);
                        }
                    }
                }
                Level::KeyTopic | Level::Overall => {}
            }
            info!(
                level = issue.level.label(),
                parent = %issue.parent,
                total = issue.total,
                "rebalanced sibling weights"
            );
        }
        issues
    }
}

fn audit(level: Level, parent: &str, weights: &[f64]) -> Option<WeightIssue> {
    if weights.is_empty() {
        return None;
    }
    let total: f64 = weights.iter().sum();
    ((total - EXPECTED_TOTAL).abs() > TOLERANCE).then(|| WeightIssue {
        level,
        parent: parent.to_string(),
        total,
        children: weights.len(),
    })
}

fn rebalanced(weight: f64, issue: &WeightIssue) -> f64 {
    if issue.total > 0.0 {
        weight / issue.total * EXPECTED_TOTAL
    } else {
        EXPECTED_TOTAL / issue.children as f64
    }
}
