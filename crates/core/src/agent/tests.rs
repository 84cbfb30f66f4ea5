use std::sync::LazyLock;

use serde::Deserialize;
use serde_json::{Value, json};
use toolrun_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelTool, OpaqueMessage,
    ToolCallResult,
};
use toolrun_test_model::{
    PresetEvent, PresetResponse, RecordedTurn, TestModelProvider, tool_call,
};

use crate::tool::{Error, Tool, ToolResult};
use crate::{
    AgentBuilder, AgentCallbacks, AgentError, CatalogError, FALLBACK_RESPONSE,
};

static ECHO_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "type": "object",
        "properties": { "text": { "type": "string" } },
        "required": ["text"]
    })
});

#[derive(Deserialize)]
struct EchoInput {
    text: String,
}

struct EchoTool;

impl Tool for EchoTool {
    type Input = EchoInput;

    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Repeats the text"
    }

    fn parameter_schema(&self) -> &Value {
        &ECHO_SCHEMA
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move { Ok(format!("echo: {}", input.text)) }
    }
}

struct BrokenTool;

impl Tool for BrokenTool {
    type Input = Value;

    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameter_schema(&self) -> &Value {
        &ECHO_SCHEMA
    }

    fn execute(
        &self,
        _input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async { Err(Error::internal().with_reason("lost its state")) }
    }
}

#[derive(Default)]
struct Recorder {
    tokens: Vec<String>,
    events: Vec<String>,
    steps: Vec<(usize, String)>,
    completed: Vec<String>,
}

impl AgentCallbacks for Recorder {
    fn on_token(&mut self, text: &str) {
        self.tokens.push(text.to_owned());
    }

    fn on_tool_call_start(&mut self, name: &str, arguments: &Value) {
        self.events.push(format!("start {name} {arguments}"));
    }

    fn on_tool_call_end(&mut self, name: &str, result: &str) {
        self.events.push(format!("end {name} {result}"));
    }

    fn on_step_end(&mut self, step: usize, text: &str) {
        self.steps.push((step, text.to_owned()));
    }

    fn on_complete(&mut self, full_text: &str) {
        self.completed.push(full_text.to_owned());
    }
}

fn tool_results(messages: &[ModelMessage]) -> Vec<&ToolCallResult> {
    messages
        .iter()
        .filter_map(|msg| match msg {
            ModelMessage::Tool(result) => Some(result),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_simple_message() {
    let provider = TestModelProvider::with_script([PresetResponse::with_events(
        [
            PresetEvent::MessageDelta("Hi, ".to_owned()),
            PresetEvent::MessageDelta("what can I do for you?".to_owned()),
        ],
    )]);
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_system_prompt("Be brief.")
        .build()
        .unwrap();

    let mut recorder = Recorder::default();
    let history = agent.run("Hello", vec![], &mut recorder).await.unwrap();

    assert_eq!(recorder.tokens, ["Hi, ", "what can I do for you?"]);
    assert_eq!(recorder.completed, ["Hi, what can I do for you?"]);
    assert_eq!(recorder.steps, [(1, "Hi, what can I do for you?".to_owned())]);
    assert!(recorder.events.is_empty());

    let roles: Vec<_> = history.iter().map(ModelMessage::role).collect();
    assert_eq!(roles, ["system", "user", "assistant"]);
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test]
async fn test_tool_results_match_requests() {
    let provider = TestModelProvider::with_script([
        PresetResponse::with_events([
            PresetEvent::MessageDelta("Checking. ".to_owned()),
            tool_call("call_1", "echo", json!({ "text": "one" })),
            tool_call("call_2", "missing", json!({})),
            tool_call("call_3", "echo", json!({ "text": "three" })),
        ]),
        PresetResponse::text("All done."),
    ]);
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(EchoTool)
        .build()
        .unwrap();

    let mut recorder = Recorder::default();
    let history = agent.run("Go", vec![], &mut recorder).await.unwrap();

    let results = tool_results(&history);
    let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["call_1", "call_2", "call_3"]);
    assert_eq!(results[0].content, "echo: one");
    assert_eq!(results[1].content, "Unknown tool: missing");
    assert_eq!(results[2].content, "echo: three");

    // Starts are reported while streaming, ends after the turn.
    assert_eq!(
        recorder.events,
        [
            r#"start echo {"text":"one"}"#,
            "start missing {}",
            r#"start echo {"text":"three"}"#,
            "end echo echo: one",
            "end missing Unknown tool: missing",
            "end echo echo: three",
        ]
    );
    assert_eq!(recorder.completed, ["Checking. All done."]);

    // The follow-up request carries the assistant turn and all results.
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    let roles: Vec<_> =
        requests[1].messages.iter().map(ModelMessage::role).collect();
    assert_eq!(roles, ["user", "assistant", "tool", "tool", "tool"]);
    let ModelMessage::Opaque(opaque) = &requests[1].messages[1] else {
        panic!("expected the provider message to be replayed");
    };
    assert_eq!(opaque.to_raw::<RecordedTurn>().unwrap().tool_calls.len(), 3);
    assert_eq!(requests[0].tools[0].name, "echo");
}

#[tokio::test]
async fn test_stop_ends_without_dispatch() {
    let provider = TestModelProvider::with_script([PresetResponse::with_events(
        [
            PresetEvent::MessageDelta("Done.".to_owned()),
            tool_call("call_1", "echo", json!({ "text": "ignored" })),
        ],
    )
    .with_finish_reason(ModelFinishReason::Stop)]);
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(EchoTool)
        .build()
        .unwrap();

    let mut recorder = Recorder::default();
    let history = agent.run("Go", vec![], &mut recorder).await.unwrap();

    assert_eq!(provider.requests().len(), 1);
    assert!(tool_results(&history).is_empty());
    assert_eq!(recorder.events.len(), 1);
    assert_eq!(recorder.completed, ["Done."]);
    assert_eq!(history.last(), Some(&ModelMessage::Assistant("Done.".into())));
}

#[tokio::test]
async fn test_truncated_tool_calls_are_not_replayed() {
    let provider = TestModelProvider::with_script([
        PresetResponse::with_events([
            PresetEvent::MessageDelta("Let me".to_owned()),
            tool_call("call_1", "echo", json!({ "text": "cut" })),
        ])
        .with_finish_reason(ModelFinishReason::Length),
        PresetResponse::text("Hello again."),
    ]);
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(EchoTool)
        .build()
        .unwrap();

    let history = agent.run("Go", vec![], &mut ()).await.unwrap();
    let mut recorder = Recorder::default();
    agent.run("Hi", history, &mut recorder).await.unwrap();
    assert_eq!(recorder.completed, ["Hello again."]);

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    let replayed_calls: usize = requests[1]
        .messages
        .iter()
        .filter_map(|msg| match msg {
            ModelMessage::Opaque(opaque) => opaque.to_raw::<RecordedTurn>(),
            _ => None,
        })
        .map(|turn| turn.tool_calls.len())
        .sum();
    assert_eq!(replayed_calls, 0);
    assert!(tool_results(&requests[1].messages).is_empty());
    assert_eq!(
        requests[1].messages[1],
        ModelMessage::Assistant("Let me".to_owned())
    );
}

#[tokio::test]
async fn test_empty_turn_falls_back() {
    let provider = TestModelProvider::with_script([PresetResponse::default()]);
    let agent = AgentBuilder::with_model_provider(provider).build().unwrap();

    let mut recorder = Recorder::default();
    let history = agent.run("Hello", vec![], &mut recorder).await.unwrap();

    assert_eq!(recorder.tokens, [FALLBACK_RESPONSE]);
    assert_eq!(recorder.completed, [FALLBACK_RESPONSE]);
    assert!(recorder.steps.is_empty());
    assert_eq!(history, [ModelMessage::User("Hello".to_owned())]);
}

#[tokio::test]
async fn test_empty_turn_after_tools_replaces_text() {
    let provider = TestModelProvider::with_script([
        PresetResponse::with_events([
            PresetEvent::MessageDelta("Let me see. ".to_owned()),
            tool_call("call_1", "echo", json!({ "text": "x" })),
        ]),
        PresetResponse::default(),
    ]);
    let agent = AgentBuilder::with_model_provider(provider)
        .with_tool(EchoTool)
        .build()
        .unwrap();

    let mut recorder = Recorder::default();
    let history = agent.run("Go", vec![], &mut recorder).await.unwrap();

    assert_eq!(recorder.completed, [FALLBACK_RESPONSE]);
    assert_eq!(tool_results(&history).len(), 1);
    assert!(matches!(history.last(), Some(ModelMessage::Tool(_))));
}

#[tokio::test]
async fn test_partial_no_output_is_kept() {
    let provider = TestModelProvider::with_script([PresetResponse::with_events(
        [
            PresetEvent::MessageDelta("Partial answer".to_owned()),
            tool_call("call_1", "echo", json!({ "text": "x" })),
            PresetEvent::Fault(ErrorKind::NoOutput),
        ],
    )]);
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(EchoTool)
        .build()
        .unwrap();

    let mut recorder = Recorder::default();
    let history = agent.run("Go", vec![], &mut recorder).await.unwrap();

    assert_eq!(recorder.completed, ["Partial answer"]);
    assert_eq!(provider.requests().len(), 1);
    assert_eq!(
        history.last(),
        Some(&ModelMessage::Assistant("Partial answer".to_owned()))
    );
    assert!(tool_results(&history).is_empty());
}

#[tokio::test]
async fn test_fatal_faults_abort() {
    for script in [
        PresetResponse::with_events([PresetEvent::Fault(ErrorKind::NoOutput)]),
        PresetResponse::with_events([
            PresetEvent::MessageDelta("Half".to_owned()),
            PresetEvent::Fault(ErrorKind::Moderated),
        ]),
        PresetResponse::rejected(ErrorKind::RateLimitExceeded),
    ] {
        let expected = match (&script.rejection, script.events.last()) {
            (Some(kind), _) => *kind,
            (None, Some(PresetEvent::Fault(kind))) => *kind,
            _ => unreachable!(),
        };
        let provider = TestModelProvider::with_script([script]);
        let agent = AgentBuilder::with_model_provider(provider).build().unwrap();

        let mut recorder = Recorder::default();
        let err = agent.run("Go", vec![], &mut recorder).await.unwrap_err();
        assert_eq!(err.model_error_kind(), Some(expected));
        assert!(recorder.completed.is_empty());
    }
}

#[tokio::test]
async fn test_tool_fault_aborts() {
    let provider = TestModelProvider::with_script([PresetResponse::with_events(
        [tool_call("call_1", "broken", json!({}))],
    )]);
    let agent = AgentBuilder::with_model_provider(provider)
        .with_tool(BrokenTool)
        .build()
        .unwrap();

    let err = agent.run("Go", vec![], &mut ()).await.unwrap_err();
    let fault = match err {
        AgentError::Tool(fault) => fault,
        err => panic!("expected a tool fault, got {err:?}"),
    };
    assert_eq!(fault.name, "broken");
    assert_eq!(fault.reason, "lost its state");
}

#[tokio::test]
async fn test_invalid_input_is_reported_to_model() {
    let provider = TestModelProvider::with_script([
        PresetResponse::with_events([tool_call(
            "call_1",
            "echo",
            json!({ "txt": "typo" }),
        )]),
        PresetResponse::text("Sorry about that."),
    ]);
    let agent = AgentBuilder::with_model_provider(provider)
        .with_tool(EchoTool)
        .build()
        .unwrap();

    let history = agent.run("Go", vec![], &mut ()).await.unwrap();
    let results = tool_results(&history);
    assert!(
        results[0]
            .content
            .starts_with("Error: Invalid input: missing field `text`")
    );
}

#[tokio::test]
async fn test_provider_tool_sentinel() {
    let provider = TestModelProvider::with_script([
        PresetResponse::with_events([tool_call(
            "call_1",
            "webSearch",
            json!({ "query": "weather" }),
        )]),
        PresetResponse::text("Sunny."),
    ]);
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_provider_tool(ModelTool {
            name: "webSearch".to_owned(),
            description: "Searches the web".to_owned(),
            parameters: json!({ "type": "object" }),
        })
        .build()
        .unwrap();

    let history = agent.run("Weather?", vec![], &mut ()).await.unwrap();
    assert_eq!(
        tool_results(&history)[0].content,
        "Provider tool webSearch - executed by model provider"
    );
    assert_eq!(provider.requests()[0].tools[0].name, "webSearch");
}

#[tokio::test]
async fn test_step_limit() {
    let looping_turn = |id: &str| {
        PresetResponse::with_events([tool_call(
            id,
            "echo",
            json!({ "text": id }),
        )])
    };
    let provider = TestModelProvider::with_script([
        looping_turn("call_1"),
        looping_turn("call_2"),
        looping_turn("call_3"),
    ]);
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(EchoTool)
        .with_max_steps(2)
        .build()
        .unwrap();
    assert_eq!(agent.max_steps(), Some(2));

    let mut recorder = Recorder::default();
    let history = agent.run("Go", vec![], &mut recorder).await.unwrap();

    assert_eq!(provider.requests().len(), 2);
    let ids: Vec<_> =
        tool_results(&history).iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, ["call_1", "call_2"]);
    assert_eq!(recorder.completed, [""]);
}

#[tokio::test]
async fn test_history_is_filtered_and_reused() {
    let provider = TestModelProvider::with_script([
        PresetResponse::text("Nice to meet you, Ada."),
        PresetResponse::text("Your name is Ada."),
    ]);
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_system_prompt("Be kind.")
        .build()
        .unwrap();

    let history = agent.run("I'm Ada.", vec![], &mut ()).await.unwrap();
    let mut history = history;
    // Left over from another provider.
    history.push(ModelMessage::Opaque(OpaqueMessage::new("other", 7u64)));
    history.push(ModelMessage::Assistant(String::new()));

    let mut recorder = Recorder::default();
    agent
        .run("What's my name?", history, &mut recorder)
        .await
        .unwrap();
    assert_eq!(recorder.completed, ["Your name is Ada."]);

    let requests = provider.requests();
    let roles: Vec<_> =
        requests[1].messages.iter().map(ModelMessage::role).collect();
    assert_eq!(roles, ["system", "user", "assistant", "user"]);
    assert_eq!(
        requests[1].messages[0],
        ModelMessage::System("Be kind.".to_owned())
    );
}

#[test]
fn test_duplicate_tools_rejected() {
    let err = AgentBuilder::with_model_provider(TestModelProvider::default())
        .with_tool(EchoTool)
        .with_provider_tool(ModelTool {
            name: "echo".to_owned(),
            description: String::new(),
            parameters: json!({}),
        })
        .build()
        .err()
        .unwrap();
    assert_eq!(err, CatalogError::DuplicateTool("echo".to_owned()));
}
