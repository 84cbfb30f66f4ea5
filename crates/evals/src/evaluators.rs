//! Scoring functions. All of them return a value in `[0, 1]`.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::EvalError;
use crate::dataset::{EvalTarget, MultiTurnTarget};
use crate::executors::{MultiTurnResult, SingleTurnResult};

/// One evaluator verdict.
#[derive(Clone, Debug, PartialEq)]
pub struct Score {
    /// The score.
    pub value: f64,
    /// Why, if the evaluator can tell.
    pub comment: Option<String>,
}

impl From<f64> for Score {
    #[inline]
    fn from(value: f64) -> Self {
        Self {
            value,
            comment: None,
        }
    }
}

/// Scores the output of one case against its target.
#[async_trait]
pub trait Evaluator<O: Sync, T: Sync>: Send + Sync {
    /// The metric name used in reports.
    fn name(&self) -> &str;

    /// Scores one case.
    async fn evaluate(
        &self,
        output: &O,
        target: &T,
    ) -> Result<Score, EvalError>;
}

/// An evaluator backed by a plain scoring function.
pub struct Metric<O, T> {
    name: &'static str,
    score: fn(&O, &T) -> f64,
}

impl<O, T> Metric<O, T> {
    /// Wraps `score` under `name`.
    #[inline]
    pub fn new(name: &'static str, score: fn(&O, &T) -> f64) -> Self {
        Self { name, score }
    }
}

#[async_trait]
impl<O: Sync, T: Sync> Evaluator<O, T> for Metric<O, T> {
    fn name(&self) -> &str {
        self.name
    }

    async fn evaluate(
        &self,
        output: &O,
        target: &T,
    ) -> Result<Score, EvalError> {
        Ok((self.score)(output, target).into())
    }
}

/// Outputs that tell which tools were used.
pub trait ToolUsage {
    /// Names of the tools the model picked. May contain duplicates.
    fn used_tools(&self) -> &[String];
}

impl ToolUsage for SingleTurnResult {
    #[inline]
    fn used_tools(&self) -> &[String] {
        &self.tool_names
    }
}

impl ToolUsage for MultiTurnResult {
    #[inline]
    fn used_tools(&self) -> &[String] {
        &self.tools_used
    }
}

/// Targets that name the tools to use and to avoid.
pub trait ToolExpectation {
    /// Tools that should be used. Empty if the target doesn't care.
    fn expected_tools(&self) -> &[String];
    /// Tools that must not be used.
    fn forbidden_tools(&self) -> &[String];
}

impl ToolExpectation for EvalTarget {
    #[inline]
    fn expected_tools(&self) -> &[String] {
        &self.expected_tools
    }

    #[inline]
    fn forbidden_tools(&self) -> &[String] {
        &self.forbidden_tools
    }
}

impl ToolExpectation for MultiTurnTarget {
    #[inline]
    fn expected_tools(&self) -> &[String] {
        &self.expected_tool_order
    }

    #[inline]
    fn forbidden_tools(&self) -> &[String] {
        &self.forbidden_tools
    }
}

fn name_set(names: &[String]) -> HashSet<&str> {
    names.iter().map(String::as_str).collect()
}

/// F1 of the picked tool names against the expected ones.
///
/// Without expectations, picking nothing scores 1 and picking anything
/// scores 0.5.
pub fn tool_selection_score(
    output: &SingleTurnResult,
    target: &EvalTarget,
) -> f64 {
    if target.expected_tools.is_empty() {
        return if output.selected_any { 0.5 } else { 1.0 };
    }

    let expected = name_set(&target.expected_tools);
    let selected = name_set(&output.tool_names);
    let hits = selected.intersection(&expected).count() as f64;
    let precision = if selected.is_empty() {
        0.0
    } else {
        hits / selected.len() as f64
    };
    let recall = hits / expected.len() as f64;

    if precision + recall == 0.0 {
        return 0.0;
    }
    2.0 * precision * recall / (precision + recall)
}

/// 1 if every expected tool was used, 0 otherwise.
pub fn tools_selected<O, T>(output: &O, target: &T) -> f64
where
    O: ToolUsage,
    T: ToolExpectation,
{
    let used = name_set(output.used_tools());
    let all_used = target
        .expected_tools()
        .iter()
        .all(|name| used.contains(name.as_str()));
    if all_used { 1.0 } else { 0.0 }
}

/// 1 if none of the forbidden tools was used, 0 otherwise.
pub fn tools_avoided<O, T>(output: &O, target: &T) -> f64
where
    O: ToolUsage,
    T: ToolExpectation,
{
    let used = name_set(output.used_tools());
    let any_used = target
        .forbidden_tools()
        .iter()
        .any(|name| used.contains(name.as_str()));
    if any_used { 0.0 } else { 1.0 }
}

/// Fraction of the expected order found as a subsequence of the calls.
/// Other calls may appear in between.
pub fn tool_order_correct(
    output: &MultiTurnResult,
    target: &MultiTurnTarget,
) -> f64 {
    let expected = &target.expected_tool_order;
    if expected.is_empty() {
        return 1.0;
    }

    let mut matched = 0;
    for name in &output.tool_call_order {
        if *name == expected[matched] {
            matched += 1;
            if matched == expected.len() {
                break;
            }
        }
    }
    matched as f64 / expected.len() as f64
}
