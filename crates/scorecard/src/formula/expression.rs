use super::segment::{segment, Operator, Segment};

const MAX_DEPTH: usize = 64;

/// Arithmetic tree over numbers, `+ - * /`, parentheses and unary sign.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Negate(Box<Expr>),
    Binary {
        op: Operator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    #[error("expression is empty")]
    Empty,
    #[error("unresolved reference '{0}'")]
    UnresolvedReference(String),
    #[error("unexpected '{found}' at position {position}")]
    Unexpected { found: String, position: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("missing closing parenthesis")]
    UnclosedParenthesis,
    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a finite number")]
    NonFinite,
}

impl Expr {
    /// Parse text that contains only numbers and operators.
    pub fn parse(text: &str) -> Result<Self, ExpressionError> {
        Self::from_segments(&segment(text))
    }

    pub fn from_segments(segments: &[Segment]) -> Result<Self, ExpressionError> {
        if segments.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let mut parser = Parser {
            segments,
            position: 0,
            depth: 0,
        };
        let expr = parser.expression()?;
        match parser.peek() {
            None => Ok(expr),
            Some(Segment::Close) => Err(ExpressionError::Unexpected {
                found: ")".to_string(),
                position: parser.position,
            }),
            Some(other) => Err(parser.unexpected(other)),
        }
    }

    pub fn evaluate(&self) -> Result<f64, ExpressionError> {
        let value = match self {
            Expr::Number(value) => *value,
            Expr::Negate(inner) => -inner.evaluate()?,
            Expr::Binary { op, lhs, rhs } => {
                let left = lhs.evaluate()?;
                let right = rhs.evaluate()?;
                match op {
                    Operator::Add => left + right,
                    Operator::Subtract => left - right,
                    Operator::Multiply => left * right,
                    Operator::Divide => {
                        if right == 0.0 {
                            return Err(ExpressionError::DivisionByZero);
                        }
                        left / right
                    }
                }
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ExpressionError::NonFinite)
        }
    }

    /// Drop a top-level `× 100` that only converts a ratio to a percentage.
    pub fn without_percent_factor(self) -> Self {
        match self {
            Expr::Binary {
                op: Operator::Multiply,
                lhs,
                rhs,
            } => {
                if is_hundred(&rhs) {
                    *lhs
                } else if is_hundred(&lhs) {
                    *rhs
                } else {
                    Expr::Binary {
                        op: Operator::Multiply,
                        lhs,
                        rhs,
                    }
                }
            }
            other => other,
        }
    }
}

fn is_hundred(expr: &Expr) -> bool {
    matches!(expr, Expr::Number(value) if (*value - 100.0).abs() < f64::EPSILON)
}

struct Parser<'a> {
    segments: &'a [Segment],
    position: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Segment> {
        self.segments.get(self.position)
    }

    fn next(&mut self) -> Option<&'a Segment> {
        let segment = self.segments.get(self.position);
        if segment.is_some() {
            self.position += 1;
        }
        segment
    }

    fn unexpected(&self, segment: &Segment) -> ExpressionError {
        match segment {
            Segment::Reference(name) => ExpressionError::UnresolvedReference(name.clone()),
            other => ExpressionError::Unexpected {
                found: other.to_string(),
                position: self.position,
            },
        }
    }

    fn expression(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.term()?;
        while let Some(Segment::Operator(op @ (Operator::Add | Operator::Subtract))) = self.peek() {
            self.position += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op: *op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, ExpressionError> {
        let mut lhs = self.unary()?;
        while let Some(Segment::Operator(op @ (Operator::Multiply | Operator::Divide))) =
            self.peek()
        {
            self.position += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary {
                op: *op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        match self.peek() {
            Some(Segment::Operator(Operator::Subtract)) => {
                self.position += 1;
                let inner = self.nested(Self::unary)?;
                Ok(Expr::Negate(Box::new(inner)))
            }
            Some(Segment::Operator(Operator::Add)) => {
                self.position += 1;
                self.nested(Self::unary)
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.next() {
            Some(Segment::Number(value)) => Ok(Expr::Number(*value)),
            Some(Segment::Open) => {
                let inner = self.nested(Self::expression)?;
                match self.next() {
                    Some(Segment::Close) => Ok(inner),
                    None => Err(ExpressionError::UnclosedParenthesis),
                    Some(other) => {
                        self.position -= 1;
                        Err(self.unexpected(other))
                    }
                }
            }
            Some(other) => {
                self.position -= 1;
                Err(self.unexpected(other))
            }
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn nested(
        &mut self,
        rule: fn(&mut Self) -> Result<Expr, ExpressionError>,
    ) -> Result<Expr, ExpressionError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExpressionError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }
}
