//! Dataset records as stored in the JSON files.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use toolrun_model::ModelMessage;

use crate::EvalError;

/// One dataset record: the input handed to an executor, and what the
/// evaluators expect from its output.
#[derive(Clone, Debug, Deserialize)]
pub struct EvalCase<D, T> {
    /// Executor input.
    pub data: D,
    /// Evaluator expectations.
    pub target: T,
}

/// Reads a dataset file, a JSON array of `{ "data", "target" }` records.
pub async fn load_cases<D, T>(
    path: &Path,
) -> Result<Vec<EvalCase<D, T>>, EvalError>
where
    D: DeserializeOwned,
    T: DeserializeOwned,
{
    let text = tokio::fs::read_to_string(path).await.map_err(|source| {
        EvalError::Io {
            path: path.to_owned(),
            source,
        }
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// A message of a pre-filled conversation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum DatasetMessage {
    /// Dropped at run time, the agent brings its own system prompt.
    System {
        /// Message text.
        content: String,
    },
    /// A user message.
    User {
        /// Message text.
        content: String,
    },
    /// An earlier assistant answer.
    Assistant {
        /// Message text.
        content: String,
    },
}

impl From<DatasetMessage> for ModelMessage {
    fn from(msg: DatasetMessage) -> Self {
        match msg {
            DatasetMessage::System { content } => ModelMessage::System(content),
            DatasetMessage::User { content } => ModelMessage::User(content),
            DatasetMessage::Assistant { content } => {
                ModelMessage::Assistant(content)
            }
        }
    }
}

/// How a case starts: a fresh prompt, or a conversation to continue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct CaseInput {
    /// The first user message of a fresh conversation.
    #[serde(default)]
    pub prompt: Option<String>,
    /// A conversation to continue. The last message must come from the
    /// user and takes precedence over `prompt`.
    #[serde(default)]
    pub messages: Option<Vec<DatasetMessage>>,
}

impl CaseInput {
    /// Splits the input into prior history and the new user message.
    pub fn to_conversation(
        &self,
    ) -> Result<(Vec<ModelMessage>, String), EvalError> {
        if let Some(messages) = &self.messages {
            let mut history: Vec<ModelMessage> =
                messages.iter().cloned().map(Into::into).collect();
            return match history.pop() {
                Some(ModelMessage::User(message)) => Ok((history, message)),
                _ => Err(EvalError::InvalidCase(
                    "the last message must come from the user".to_owned(),
                )),
            };
        }
        match &self.prompt {
            Some(prompt) => Ok((vec![], prompt.clone())),
            None => Err(EvalError::InvalidCase(
                "the case has neither `prompt` nor `messages`".to_owned(),
            )),
        }
    }
}

/// Per-case overrides.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalConfig {
    /// Model to run the case with.
    #[serde(default)]
    pub model: Option<String>,
    /// Step ceiling of the agent loop.
    #[serde(default)]
    pub max_steps: Option<usize>,
}

/// Input of a single-turn case.
#[derive(Clone, Debug, Deserialize)]
pub struct EvalData {
    /// The conversation.
    #[serde(flatten)]
    pub input: CaseInput,
    /// Names of the built-in tools offered to the model.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Overrides.
    #[serde(default)]
    pub config: Option<EvalConfig>,
}

/// Expectations of a single-turn case.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalTarget {
    /// Tools the model should pick.
    #[serde(default)]
    pub expected_tools: Vec<String>,
    /// Tools the model must not pick.
    #[serde(default)]
    pub forbidden_tools: Vec<String>,
    /// Free-form grouping label.
    #[serde(default)]
    pub category: Option<String>,
}

/// A tool that answers with a fixed result.
#[derive(Clone, Debug, Deserialize)]
pub struct MockToolDefinition {
    /// Shown to the model.
    pub description: String,
    /// JSON schema of the arguments. Any object is accepted if absent.
    #[serde(default)]
    pub parameters: Option<Value>,
    /// Returned for every call. Strings are passed as is, anything else is
    /// serialized to JSON.
    pub result: Value,
}

/// Input of a multi-turn case.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiTurnEvalData {
    /// The conversation.
    #[serde(flatten)]
    pub input: CaseInput,
    /// Mocked tools by name.
    #[serde(default)]
    pub mock_tools: BTreeMap<String, MockToolDefinition>,
    /// Overrides.
    #[serde(default)]
    pub config: Option<EvalConfig>,
}

/// Expectations of a multi-turn case.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiTurnTarget {
    /// Tools that should be called, in this relative order.
    #[serde(default)]
    pub expected_tool_order: Vec<String>,
    /// Tools that must not be called.
    #[serde(default)]
    pub forbidden_tools: Vec<String>,
    /// The mocked results, shown to the judge.
    #[serde(default)]
    pub mock_tool_results: Option<Value>,
    /// The task as the judge should understand it.
    #[serde(default)]
    pub original_task: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_multi_turn_record() {
        let case: EvalCase<MultiTurnEvalData, MultiTurnTarget> =
            serde_json::from_value(json!({
                "data": {
                    "prompt": "What's in notes.txt?",
                    "mockTools": {
                        "readFile": {
                            "description": "Read a file",
                            "result": "buy milk"
                        }
                    },
                    "config": { "maxSteps": 5 }
                },
                "target": {
                    "expectedToolOrder": ["readFile"],
                    "forbiddenTools": ["runCommand"],
                    "originalTask": "Summarize notes.txt"
                }
            }))
            .unwrap();

        assert_eq!(case.data.input.prompt.as_deref(), Some("What's in notes.txt?"));
        assert_eq!(case.data.mock_tools["readFile"].result, json!("buy milk"));
        assert_eq!(case.data.config.unwrap().max_steps, Some(5));
        assert_eq!(case.target.expected_tool_order, ["readFile"]);
        assert!(case.target.mock_tool_results.is_none());
    }

    #[test]
    fn test_conversation_from_messages() {
        let input: CaseInput = serde_json::from_value(json!({
            "prompt": "ignored",
            "messages": [
                { "role": "user", "content": "List the files" },
                { "role": "assistant", "content": "a.txt, b.txt" },
                { "role": "user", "content": "Now read a.txt" }
            ]
        }))
        .unwrap();
        let (history, message) = input.to_conversation().unwrap();
        assert_eq!(message, "Now read a.txt");
        assert_eq!(
            history,
            [
                ModelMessage::User("List the files".to_owned()),
                ModelMessage::Assistant("a.txt, b.txt".to_owned()),
            ]
        );
    }

    #[test]
    fn test_invalid_conversations() {
        let ends_with_assistant = CaseInput {
            prompt: None,
            messages: Some(vec![DatasetMessage::Assistant {
                content: "Hi".to_owned(),
            }]),
        };
        assert!(matches!(
            ends_with_assistant.to_conversation(),
            Err(EvalError::InvalidCase(_))
        ));
        assert!(CaseInput::default().to_conversation().is_err());
    }

    #[tokio::test]
    async fn test_load_cases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.json");
        std::fs::write(
            &path,
            r#"[{ "data": { "prompt": "Hi", "tools": ["readFile"] }, "target": {} }]"#,
        )
        .unwrap();

        let cases: Vec<EvalCase<EvalData, EvalTarget>> =
            load_cases(&path).await.unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].data.tools, ["readFile"]);
        assert!(cases[0].target.expected_tools.is_empty());

        let missing = load_cases::<EvalData, EvalTarget>(&dir.path().join("nope.json")).await;
        assert!(matches!(missing, Err(EvalError::Io { .. })));
    }
}
