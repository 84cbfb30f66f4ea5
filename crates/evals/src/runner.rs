use std::collections::BTreeMap;

use serde::Serialize;
use tracing::Instrument;

use crate::dataset::EvalCase;
use crate::evaluators::Evaluator;
use crate::executors::Executor;

/// Scores of one case.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CaseReport {
    /// Position in the dataset.
    pub index: usize,
    /// Score by metric name.
    pub scores: BTreeMap<String, f64>,
    /// Evaluator comments by metric name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub comments: BTreeMap<String, String>,
    /// Failures of the executor or of single evaluators.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Scores of a whole dataset.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EvalReport {
    /// Per case, in dataset order.
    pub cases: Vec<CaseReport>,
    /// Mean of every metric over the cases that have it.
    pub averages: BTreeMap<String, f64>,
}

/// Runs every case and scores it with every evaluator.
///
/// Cases run one after another. A failing case or evaluator is recorded
/// in the report and doesn't stop the others.
pub async fn evaluate<E, T>(
    executor: &E,
    cases: &[EvalCase<E::Data, T>],
    evaluators: &[Box<dyn Evaluator<E::Output, T>>],
) -> EvalReport
where
    E: Executor,
    T: Sync,
{
    let mut report = EvalReport::default();
    for (index, case) in cases.iter().enumerate() {
        let case_report = run_case(executor, index, case, evaluators)
            .instrument(info_span!("eval case", index))
            .await;
        report.cases.push(case_report);
    }

    report.averages = averages(&report.cases);
    report
}

async fn run_case<E, T>(
    executor: &E,
    index: usize,
    case: &EvalCase<E::Data, T>,
    evaluators: &[Box<dyn Evaluator<E::Output, T>>],
) -> CaseReport
where
    E: Executor,
    T: Sync,
{
    let mut report = CaseReport {
        index,
        ..Default::default()
    };
    let output = match executor.execute(&case.data).await {
        Ok(output) => output,
        Err(err) => {
            warn!("case failed: {err}");
            report.errors.push(err.to_string());
            return report;
        }
    };

    for evaluator in evaluators {
        let name = evaluator.name().to_owned();
        match evaluator.evaluate(&output, &case.target).await {
            Ok(score) => {
                if let Some(comment) = score.comment {
                    report.comments.insert(name.clone(), comment);
                }
                report.scores.insert(name, score.value);
            }
            Err(err) => {
                warn!("evaluator {name} failed: {err}");
                report.errors.push(format!("{name}: {err}"));
            }
        }
    }
    report
}

fn averages(cases: &[CaseReport]) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for case in cases {
        for (name, score) in &case.scores {
            let entry = sums.entry(name.as_str()).or_default();
            entry.0 += score;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(name, (sum, count))| (name.to_owned(), sum / count as f64))
        .collect()
}
