//! Formula text → data point bindings → restricted arithmetic evaluation.
//!
//! Formulas are free text written for humans (`Earned Value (EV) / Planned Value (PV)`). They
//! are segmented into numbers, operators and reference phrases; phrases are linked to data
//! points once by the [`FormulaMatcher`], and every calculation substitutes the bound values
//! into an [`Expr`] tree. Nothing here executes formula text.

mod evaluator;
mod expression;
mod kind;
mod matcher;
mod preview;
mod qualitative;
mod segment;

pub use evaluator::{
    Evaluation, EvaluationInput, EvaluationIssue, EvaluationStatus, FormulaEvaluator,
};
pub use expression::{Expr, ExpressionError};
pub use kind::detect_kind;
pub use matcher::{
    base_name, BindOutcome, DataPointMatch, FormulaBinding, FormulaMatcher, MatchMethod,
};
pub use preview::{FormulaPreview, PreviewOutcome, PreviewRequest};
pub use qualitative::{
    classify_response, qualitative_options, rating_for, QualitativeLabel, QualitativeOption,
};
pub use segment::{normalize, references, segment, Operator, Segment};
