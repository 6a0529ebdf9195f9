use crate::infra::{report_import, InMemoryAssessmentRepository};
use clap::Args;
use scorecard::assessment::{
    write_csv, AssessmentEngine, AssessmentReport, AssessmentResult, AssessmentService,
    AssessmentServiceError, NewAssessment, Overrides,
};
use scorecard::config::EngineConfig;
use scorecard::error::AppError;
use scorecard::formula::{FormulaMatcher, FormulaPreview, PreviewRequest};
use scorecard::hierarchy::import::{MasterFileImporter, SAMPLE_MASTER_FILE, SAMPLE_VALUES_FILE};
use scorecard::hierarchy::{FormulaKind, Hierarchy};
use scorecard::rating::ThresholdSet;
use scorecard::store::{read_values_csv, DataPointStore};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// Master file CSV describing the hierarchy and formulas
    #[arg(long)]
    pub(crate) hierarchy: PathBuf,
    /// `Data Point, Value` CSV with the raw entries
    #[arg(long)]
    pub(crate) values: PathBuf,
    /// Write the flat CSV export to this path
    #[arg(long)]
    pub(crate) csv_out: Option<PathBuf>,
    /// Restrict the export to one pillar (full name or abbreviation such as P&M)
    #[arg(long)]
    pub(crate) pillar: Option<String>,
    /// Minimum confidence for binding formula tokens to data points
    #[arg(long, default_value_t = EngineConfig::DEFAULT_MATCH_THRESHOLD)]
    pub(crate) match_threshold: f64,
}

#[derive(Args, Debug, Default)]
pub(crate) struct FormulaArgs {
    /// Formula text, e.g. "Earned Value (EV) / Planned Value (PV)"
    #[arg(long)]
    pub(crate) formula: String,
    /// Data point entry as NAME=VALUE; repeat for each input
    #[arg(long = "value", value_parser = parse_assignment)]
    pub(crate) values: Vec<(String, String)>,
    /// Force the formula kind instead of detecting it
    #[arg(long, value_parser = parse_kind)]
    pub(crate) kind: Option<FormulaKind>,
    /// Good threshold, e.g. ">0.95"
    #[arg(long)]
    pub(crate) good: Option<String>,
    /// Satisfactory threshold, e.g. "0.85-0.95"
    #[arg(long)]
    pub(crate) satisfactory: Option<String>,
    /// Needs Improvement threshold, e.g. "<0.85"
    #[arg(long)]
    pub(crate) needs_improvement: Option<String>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print the CSV export after the summary.
    #[arg(long)]
    pub(crate) include_csv: bool,
    /// Skip the what-if recalculation portion of the demo.
    #[arg(long)]
    pub(crate) skip_what_if: bool,
}

pub(crate) fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing data point name in '{raw}'"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_kind(raw: &str) -> Result<FormulaKind, String> {
    FormulaKind::from_label(raw).ok_or_else(|| {
        format!("unknown formula kind '{raw}' (quantitative, qualitative or descriptive)")
    })
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let EvaluateArgs {
        hierarchy,
        values,
        csv_out,
        pillar,
        match_threshold,
    } = args;

    let matcher = FormulaMatcher::new(match_threshold);
    let imported = MasterFileImporter::from_path(&hierarchy, &matcher)?;
    report_import(&imported);
    for warning in &imported.warnings {
        println!("warning (row {}): {}", warning.row, warning.message);
    }
    for issue in imported.hierarchy.weight_issues() {
        println!(
            "warning: {} weights under '{}' sum to {:.1}",
            issue.level.label(),
            issue.parent,
            issue.total
        );
    }

    let hierarchy = Arc::new(imported.hierarchy);
    let mut store = DataPointStore::for_hierarchy(&hierarchy);
    store.load_csv(File::open(&values)?)?;

    let engine = AssessmentEngine::new(hierarchy.clone());
    let result = engine.calculate(&store, &Overrides::new());
    render_scorecard(&result);
    render_report(&hierarchy, &result);

    match csv_out {
        Some(path) => {
            let file = File::create(&path)?;
            write_csv(&hierarchy, &result, pillar.as_deref(), file)
                .map_err(AssessmentServiceError::from)?;
            println!("\nCSV export written to {}", path.display());
        }
        None if pillar.is_some() => {
            println!();
            write_csv(&hierarchy, &result, pillar.as_deref(), std::io::stdout())
                .map_err(AssessmentServiceError::from)?;
        }
        None => {}
    }

    Ok(())
}

pub(crate) fn run_formula(args: FormulaArgs) -> Result<(), AppError> {
    let FormulaArgs {
        formula,
        values,
        kind,
        good,
        satisfactory,
        needs_improvement,
    } = args;

    let request = PreviewRequest {
        formula,
        kind,
        values: values.into_iter().collect(),
        thresholds: ThresholdSet::new(
            good.as_deref().unwrap_or_default(),
            satisfactory.as_deref().unwrap_or_default(),
            needs_improvement.as_deref().unwrap_or_default(),
        ),
    };
    let outcome = FormulaPreview::default().run(&request);

    println!("Formula: {}", request.formula);
    println!("Kind: {}", outcome.kind.label());
    for binding in &outcome.bindings {
        println!(
            "- '{}' -> {} (confidence {:.2})",
            binding.token, binding.data_point, binding.confidence
        );
    }
    for token in &outcome.unresolved {
        println!("- '{token}' -> no matching data point");
    }
    if let Some(expression) = &outcome.evaluation.expression {
        println!("Expression: {expression}");
    }
    match &outcome.evaluation.issue {
        Some(issue) => println!(
            "Status: {} ({issue})",
            outcome.evaluation.status.label()
        ),
        None => println!("Status: {}", outcome.evaluation.status.label()),
    }
    match outcome.evaluation.label {
        Some(label) => println!("Response: {}", label.label()),
        None => println!("Value: {:.4}", outcome.evaluation.value),
    }
    println!("Rating: {}", outcome.rating.label());
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        include_csv,
        skip_what_if,
    } = args;

    println!("Assessment scorecard demo");
    let matcher = FormulaMatcher::default();
    let imported = MasterFileImporter::from_reader(SAMPLE_MASTER_FILE.as_bytes(), &matcher)?;
    let hierarchy = Arc::new(imported.hierarchy);
    println!(
        "- {} pillars | {} key topics | {} signals | {} criteria | {} data points",
        hierarchy.pillars().len(),
        hierarchy.key_topics().len(),
        hierarchy.signals().len(),
        hierarchy.criteria().len(),
        hierarchy.data_points().len()
    );

    let engine = Arc::new(AssessmentEngine::new(hierarchy.clone()));
    let repository = Arc::new(InMemoryAssessmentRepository::default());
    let service = AssessmentService::new(repository, engine).with_matcher(matcher);

    let values: BTreeMap<String, String> = read_values_csv(SAMPLE_VALUES_FILE.as_bytes())?
        .into_iter()
        .collect();
    let record = service.create(NewAssessment {
        name: "Sample programme".to_string(),
        values,
    })?;
    println!(
        "- Opened assessment {} with {} values",
        record.id,
        record.store.len()
    );

    let result = service.calculate(&record.id)?;
    render_scorecard(&result);
    render_report(&hierarchy, &result);

    if !skip_what_if {
        println!("\nWhat-if: earned value recovers to 1,010,000");
        let mut update = BTreeMap::new();
        update.insert(
            "Earned Value (EV) (No.)".to_string(),
            "1,010,000".to_string(),
        );
        service.record_values(&record.id, &update)?;
        let revised = service.calculate(&record.id)?;
        println!(
            "- Overall {} -> {}",
            format_score(result.overall.value, result.overall.rating.label()),
            format_score(revised.overall.value, revised.overall.rating.label())
        );
        println!("Snapshot history:");
        for snapshot in service.history(&record.id)? {
            println!(
                "  - v{} at {} | {}",
                snapshot.version,
                snapshot.created_at.format("%Y-%m-%d %H:%M:%S"),
                format_score(snapshot.overall, snapshot.rating)
            );
        }
    }

    if include_csv {
        println!("\nCSV export");
        print!("{}", service.export_csv(&record.id, None)?);
    }

    Ok(())
}

fn format_score(value: Option<f64>, rating: &str) -> String {
    match value {
        Some(value) => format!("{:.1}% ({rating})", value * 100.0),
        None => "n/a".to_string(),
    }
}

fn render_scorecard(result: &AssessmentResult) {
    println!(
        "\nOverall score: {}",
        format_score(result.overall.value, result.overall.rating.label())
    );
    for topic in &result.key_topics {
        println!(
            "{} [{}]: {}",
            topic.name,
            topic.parent,
            format_score(topic.value, topic.rating.label())
        );
        for signal in result.signals_for_topic(&topic.name) {
            println!(
                "  {}: {} | {} of {} criteria excluded",
                signal.name,
                format_score(signal.value, signal.rating.label()),
                signal.skipped,
                signal.contributing + signal.skipped
            );
            for criterion in result.criteria_for_signal(&signal.name) {
                let shown = criterion.display_value();
                let shown = if shown.is_empty() { "-" } else { shown.as_str() };
                match criterion.message() {
                    Some(message) => println!(
                        "    - {}: {shown} [{}] {message}",
                        criterion.name,
                        criterion.status.label()
                    ),
                    None => println!(
                        "    - {}: {shown} ({})",
                        criterion.name,
                        criterion.rating.label()
                    ),
                }
            }
        }
    }
}

fn render_report(hierarchy: &Hierarchy, result: &AssessmentResult) {
    let report = AssessmentReport::new(hierarchy, result);
    let summary = report.summary();
    println!(
        "\nCriteria: {} good | {} satisfactory | {} needs improvement | {} unrated",
        summary.criteria.good,
        summary.criteria.satisfactory,
        summary.criteria.needs_improvement,
        summary.criteria.unknown
    );
    println!(
        "Statuses: {} calculated | {} incomplete | {} error | {} overridden",
        summary.statuses.calculated,
        summary.statuses.incomplete,
        summary.statuses.error,
        summary.overridden
    );

    println!("Pillars:");
    for pillar in report.pillar_breakdown() {
        println!(
            "  - {}: {}",
            pillar.pillar,
            format_score(pillar.value, pillar.rating_label)
        );
    }

    let recommendations = report.recommendations();
    if !recommendations.is_empty() {
        println!("Recommendations:");
        for recommendation in recommendations {
            println!(
                "  - {} ({}): {}",
                recommendation.key_topic, recommendation.rating_label, recommendation.action
            );
        }
    }

    let improvement_areas = report.improvement_areas();
    if !improvement_areas.is_empty() {
        println!("Improvement areas:");
        for area in improvement_areas {
            println!(
                "  - {} in {} (weight {:.0}, value {:.4})",
                area.criterion, area.performance_signal, area.weight, area.value
            );
        }
    }
}
