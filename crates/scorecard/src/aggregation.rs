use serde::Serialize;

/// Child entry offered to a roll-up. `value: None` marks a child that is absent from the
/// average (incomplete, errored, qualitative or without data).
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedValue {
    pub value: Option<f64>,
    pub weight: f64,
}

impl WeightedValue {
    pub fn new(value: Option<f64>, weight: f64) -> Self {
        Self { value, weight }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateOutcome {
    /// `None` when no child carried a valid value.
    pub value: Option<f64>,
    pub contributing: usize,
    pub skipped: usize,
    /// `false` when the weights summed to zero and a plain mean was used.
    pub weighted: bool,
}

/// Weight-normalized roll-up on the decimal scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregator {
    upper_bound: f64,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self { upper_bound: 1.0 }
    }
}

impl Aggregator {
    pub fn new(upper_bound: f64) -> Self {
        Self { upper_bound }
    }

    /// Σ(v·w)/Σw over valid children, each value clamped to the upper bound first. Zero total
    /// weight falls back to the unweighted mean.
    pub fn aggregate(&self, children: &[WeightedValue]) -> AggregateOutcome {
        let mut valid: Vec<(f64, f64)> = children
            .iter()
            .filter_map(|child| {
                let value = child.value.filter(|value| value.is_finite())?;
                let weight = if child.weight.is_finite() && child.weight > 0.0 {
                    child.weight
                } else {
                    0.0
                };
                Some((value.min(self.upper_bound), weight))
            })
            .collect();
        let skipped = children.len() - valid.len();

        if valid.is_empty() {
            return AggregateOutcome {
                value: None,
                contributing: 0,
                skipped,
                weighted: false,
            };
        }

        // fixed summation order keeps the result independent of child order
        valid.sort_by(|left, right| {
            left.0
                .total_cmp(&right.0)
                .then_with(|| left.1.total_cmp(&right.1))
        });

        let total_weight: f64 = valid.iter().map(|(_, weight)| weight).sum();
        let (value, weighted) = if total_weight > 0.0 {
            let weighted_sum: f64 = valid.iter().map(|(value, weight)| value * weight).sum();
            (weighted_sum / total_weight, true)
        } else {
            (mean(valid.iter().map(|(value, _)| *value)), false)
        };

        AggregateOutcome {
            value: Some(value),
            contributing: valid.len(),
            skipped,
            weighted,
        }
    }

    /// Overall score: unweighted mean of the key topic values.
    pub fn overall(&self, key_topics: &[Option<f64>]) -> AggregateOutcome {
        let children: Vec<WeightedValue> = key_topics
            .iter()
            .map(|value| WeightedValue::new(*value, 0.0))
            .collect();
        self.aggregate(&children)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
