use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

const EQUALITY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparison {
    GreaterThan,
    AtLeast,
    LessThan,
    AtMost,
    Equal,
}

impl Comparison {
    fn symbol(&self) -> &'static str {
        match self {
            Comparison::GreaterThan => ">",
            Comparison::AtLeast => ">=",
            Comparison::LessThan => "<",
            Comparison::AtMost => "<=",
            Comparison::Equal => "=",
        }
    }
}

/// Parsed threshold on the decimal scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ThresholdExpr {
    Compare { op: Comparison, bound: f64 },
    /// Inclusive on both ends.
    Range { low: f64, high: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThresholdParseError {
    #[error("threshold is empty")]
    Empty,
    #[error("unrecognized threshold '{0}'")]
    Unrecognized(String),
}

static COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(>=|<=|=>|=<|≥|≤|>|<|=)?\s*(-?\d+(?:\.\d+)?|-?\.\d+)\s*(%)?$")
        .expect("comparison pattern compiles")
});

static RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d+(?:\.\d+)?|\.\d+)\s*(%)?\s*(?:-|–|to)\s*(\d+(?:\.\d+)?|\.\d+)\s*(%)?$",
    )
    .expect("range pattern compiles")
});

static PHRASES: [(&str, Comparison); 10] = [
    ("greater than or equal to", Comparison::AtLeast),
    ("less than or equal to", Comparison::AtMost),
    ("more than", Comparison::GreaterThan),
    ("greater than", Comparison::GreaterThan),
    ("above", Comparison::GreaterThan),
    ("at least", Comparison::AtLeast),
    ("less than", Comparison::LessThan),
    ("below", Comparison::LessThan),
    ("under", Comparison::LessThan),
    ("at most", Comparison::AtMost),
];

impl ThresholdExpr {
    /// Parse `>N`, `<N`, `>=N`, `<=N`, `≥N`, `≤N`, `=N`, `A-B`, bare `N` (read as `>=N`) and
    /// the wordy variants (`more than 90%`). A `%` suffix or a bound above 1 divides by 100.
    pub fn parse(raw: &str) -> Result<Self, ThresholdParseError> {
        let compact = raw.trim().replace(',', "");
        if compact.is_empty() {
            return Err(ThresholdParseError::Empty);
        }
        let lowered = compact.to_lowercase();

        let mut text = lowered.as_str();
        let mut phrase_op = None;
        for (phrase, op) in PHRASES.iter() {
            if let Some(rest) = text.strip_prefix(phrase) {
                text = rest.trim_start();
                phrase_op = Some(*op);
                break;
            }
        }

        if phrase_op.is_none() {
            if let Some(captures) = RANGE.captures(text) {
                let low = number(&captures[1])?;
                let high = number(&captures[3])?;
                // `70-90` and `0.7-0.9` describe the same band; scale both ends together.
                let percent =
                    captures.get(2).is_some() || captures.get(4).is_some() || low.max(high) > 1.0;
                let (low, high) = if percent {
                    (low / 100.0, high / 100.0)
                } else {
                    (low, high)
                };
                let (low, high) = if low <= high { (low, high) } else { (high, low) };
                return Ok(ThresholdExpr::Range { low, high });
            }
        }

        let captures = COMPARISON
            .captures(text)
            .ok_or_else(|| ThresholdParseError::Unrecognized(raw.trim().to_string()))?;
        let symbol_op = captures.get(1).map(|symbol| match symbol.as_str() {
            ">" => Comparison::GreaterThan,
            "<" => Comparison::LessThan,
            "=" => Comparison::Equal,
            ">=" | "=>" | "≥" => Comparison::AtLeast,
            _ => Comparison::AtMost,
        });
        if phrase_op.is_some() && symbol_op.is_some() {
            return Err(ThresholdParseError::Unrecognized(raw.trim().to_string()));
        }
        let op = phrase_op.or(symbol_op).unwrap_or(Comparison::AtLeast);
        let bound = number(&captures[2])?;
        let bound = if captures.get(3).is_some() || bound > 1.0 {
            bound / 100.0
        } else {
            bound
        };
        Ok(ThresholdExpr::Compare { op, bound })
    }

    pub fn matches(&self, value: f64) -> bool {
        match *self {
            ThresholdExpr::Compare { op, bound } => match op {
                Comparison::GreaterThan => value > bound,
                Comparison::AtLeast => value >= bound,
                Comparison::LessThan => value < bound,
                Comparison::AtMost => value <= bound,
                Comparison::Equal => (value - bound).abs() <= EQUALITY_TOLERANCE,
            },
            ThresholdExpr::Range { low, high } => value >= low && value <= high,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ThresholdExpr::Compare { op, bound } => format!("{}{}", op.symbol(), bound),
            ThresholdExpr::Range { low, high } => format!("{low}-{high}"),
        }
    }
}

fn number(text: &str) -> Result<f64, ThresholdParseError> {
    text.parse::<f64>()
        .map_err(|_| ThresholdParseError::Unrecognized(text.to_string()))
}
