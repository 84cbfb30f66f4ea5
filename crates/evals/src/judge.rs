//! A second model call that grades the final answer of a multi-turn run.

use async_trait::async_trait;
use serde::Deserialize;
use toolrun_core::{Agent, AgentBuilder, AgentCallbacks, CatalogError};
use toolrun_model::ModelProvider;

use crate::EvalError;
use crate::dataset::MultiTurnTarget;
use crate::evaluators::{Evaluator, Score};
use crate::executors::MultiTurnResult;

const JUDGE_PROMPT: &str = r#"You are an evaluation judge. Score the agent's response on a scale of 1-10.

Scoring criteria:
- 10: Response fully addresses the task using tool results correctly
- 7-9: Response is mostly correct with minor issues
- 4-6: Response partially addresses the task
- 1-3: Response is mostly incorrect or irrelevant

Reply with a single JSON object and nothing else:
{"score": <number from 1 to 10>, "reason": "<a brief reason for the score>"}"#;

/// The judge's verdict.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Judgement {
    /// From 1 to 10, 10 being perfect.
    pub score: f64,
    /// A brief reason for the score.
    pub reason: String,
}

/// Grades answers with a model.
pub struct LlmJudge {
    agent: Agent,
}

impl LlmJudge {
    /// Creates a judge backed by `provider`.
    pub fn new<P: ModelProvider + 'static>(
        provider: P,
    ) -> Result<Self, CatalogError> {
        let agent = AgentBuilder::with_model_provider(provider)
            .with_system_prompt(JUDGE_PROMPT)
            .with_max_steps(1)
            .build()?;
        Ok(Self { agent })
    }

    /// Asks the model to grade the output of one case.
    pub async fn judge(
        &self,
        output: &MultiTurnResult,
        target: &MultiTurnTarget,
    ) -> Result<Judgement, EvalError> {
        let mut reply = Reply::default();
        self.agent
            .run(judge_request(output, target), vec![], &mut reply)
            .await?;
        let judgement = parse_judgement(&reply.text)?;
        info!("judge gave {}: {}", judgement.score, judgement.reason);
        Ok(judgement)
    }
}

#[async_trait]
impl Evaluator<MultiTurnResult, MultiTurnTarget> for LlmJudge {
    fn name(&self) -> &str {
        "outputQuality"
    }

    async fn evaluate(
        &self,
        output: &MultiTurnResult,
        target: &MultiTurnTarget,
    ) -> Result<Score, EvalError> {
        let judgement = self.judge(output, target).await?;
        Ok(Score {
            value: judgement.score,
            comment: Some(judgement.reason),
        })
    }
}

#[derive(Default)]
struct Reply {
    text: String,
}

impl AgentCallbacks for Reply {
    fn on_complete(&mut self, full_text: &str) {
        self.text = full_text.to_owned();
    }
}

fn judge_request(output: &MultiTurnResult, target: &MultiTurnTarget) -> String {
    let tool_results = target
        .mock_tool_results
        .as_ref()
        .map_or_else(|| "null".to_owned(), |results| results.to_string());
    format!(
        "Task: {task}\n\n\
         Tools called: {calls:?}\n\
         Tool results provided: {tool_results}\n\n\
         Agent's final response:\n{text}\n\n\
         Evaluate if this response correctly uses the tool results to answer the task.",
        task = target.original_task,
        calls = output.tool_call_order,
        text = output.text,
    )
}

/// Extracts the verdict from the reply, which may wrap the JSON object in
/// prose or a code fence. Scores are clamped to `1..=10`.
fn parse_judgement(reply: &str) -> Result<Judgement, EvalError> {
    let object = reply
        .find('{')
        .zip(reply.rfind('}'))
        .filter(|(start, end)| start < end)
        .map(|(start, end)| &reply[start..=end])
        .ok_or_else(|| {
            EvalError::Judge(format!("no JSON object in {reply:?}"))
        })?;
    let mut judgement: Judgement = serde_json::from_str(object)
        .map_err(|err| EvalError::Judge(format!("{err} in {object:?}")))?;
    if !judgement.score.is_finite() {
        return Err(EvalError::Judge(format!(
            "score {} is not a number",
            judgement.score
        )));
    }
    judgement.score = judgement.score.clamp(1.0, 10.0);
    Ok(judgement)
}

#[cfg(test)]
mod tests {
    use toolrun_model::ModelMessage;
    use toolrun_test_model::{PresetResponse, TestModelProvider};

    use super::*;

    fn transcript() -> MultiTurnResult {
        MultiTurnResult {
            text: "You need to buy milk.".to_owned(),
            steps: vec![],
            tool_call_order: vec!["readFile".to_owned()],
            tools_used: vec!["readFile".to_owned()],
        }
    }

    fn target() -> MultiTurnTarget {
        MultiTurnTarget {
            original_task: "What's on my todo list?".to_owned(),
            mock_tool_results: Some(serde_json::json!({ "readFile": "milk" })),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_judgement() {
        let judgement = parse_judgement(
            "Sure!\n```json\n{\"score\": 8, \"reason\": \"Uses the file.\"}\n```",
        )
        .unwrap();
        assert_eq!(
            judgement,
            Judgement {
                score: 8.0,
                reason: "Uses the file.".to_owned(),
            }
        );

        let clamped =
            parse_judgement(r#"{"score": 42, "reason": "great"}"#).unwrap();
        assert_eq!(clamped.score, 10.0);

        assert!(matches!(
            parse_judgement("I'd say 7 out of 10."),
            Err(EvalError::Judge(_))
        ));
        assert!(matches!(
            parse_judgement(r#"{"grade": 7}"#),
            Err(EvalError::Judge(_))
        ));
    }

    #[tokio::test]
    async fn test_judge_request() {
        let provider = TestModelProvider::with_script([PresetResponse::text(
            r#"{"score": 9, "reason": "Correct."}"#,
        )]);
        let judge = LlmJudge::new(provider.clone()).unwrap();

        let score = judge.evaluate(&transcript(), &target()).await.unwrap();
        assert_eq!(score.value, 9.0);
        assert_eq!(score.comment.as_deref(), Some("Correct."));

        let request = provider.requests().pop().unwrap();
        assert!(request.tools.is_empty());
        assert_eq!(request.messages[0], ModelMessage::System(JUDGE_PROMPT.to_owned()));
        let ModelMessage::User(question) = &request.messages[1] else {
            panic!("expected the question, got {:?}", request.messages[1]);
        };
        assert!(question.starts_with("Task: What's on my todo list?\n"));
        assert!(question.contains(r#"Tools called: ["readFile"]"#));
        assert!(question.contains(r#"Tool results provided: {"readFile":"milk"}"#));
        assert!(question.contains("You need to buy milk."));
    }
}
