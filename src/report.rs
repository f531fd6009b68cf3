//! Text and JSON rendering of evaluation results.

use crate::batch::CaseOutcome;
use crate::error::Result;
use crate::types::{CaseMetrics, RegionMetrics};
use std::fmt::Write;

/// `Recall: r Precision: p Dice: d AVD: a`, four decimals each.
///
/// An undefined AVD is printed as `n/a`.
pub fn format_metrics(metrics: &CaseMetrics) -> String {
    let avd = match metrics.avd {
        Some(avd) => format!("{:.4}", avd),
        None => "n/a".to_string(),
    };
    format!(
        "Recall: {:.4} Precision: {:.4} Dice: {:.4} AVD: {}",
        metrics.recall, metrics.precision, metrics.dice, avd
    )
}

/// One line per case: the case id followed by each region's metrics.
///
/// ```
/// use pvs_eval::report::format_case_line;
/// use pvs_eval::types::{CaseMetrics, InstanceCounts, RegionMetrics};
///
/// let metrics = CaseMetrics {
///     dice: 0.5,
///     avd: None,
///     recall: 1.0,
///     precision: 0.25,
///     instances: InstanceCounts::default(),
/// };
/// let line = format_case_line("case_01", &[RegionMetrics { region: "CSO".into(), metrics }]);
/// assert_eq!(
///     line,
///     "case_01 CSO: Recall: 1.0000 Precision: 0.2500 Dice: 0.5000 AVD: n/a"
/// );
/// ```
pub fn format_case_line(case_id: &str, regions: &[RegionMetrics]) -> String {
    let mut line = case_id.to_string();
    for region in regions {
        // Writing into a String cannot fail.
        let _ = write!(line, " {}: {}", region.region, format_metrics(&region.metrics));
    }
    line
}

/// Text report for a batch, one line per outcome.
pub fn format_outcomes_text(outcomes: &[CaseOutcome]) -> String {
    outcomes
        .iter()
        .map(|outcome| match outcome {
            CaseOutcome::Evaluated(report) => format_case_line(&report.case_id, &report.regions),
            CaseOutcome::Failed { case_id, error } => format!("{} FAILED: {}", case_id, error),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pretty-printed JSON report for a batch.
pub fn format_outcomes_json(outcomes: &[CaseOutcome]) -> Result<String> {
    Ok(serde_json::to_string_pretty(outcomes)?)
}
