//! Runs an eval dataset against the agent loop and prints the scores.

#[macro_use]
extern crate tracing;

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use toolrun_evals::dataset::{
    EvalData, EvalTarget, MultiTurnEvalData, MultiTurnTarget, load_cases,
};
use toolrun_evals::evaluators::*;
use toolrun_evals::executors::{
    DEFAULT_MAX_STEPS, MultiTurnExecutor, MultiTurnResult, ProviderFactory,
    SingleTurnExecutor, SingleTurnResult,
};
use toolrun_evals::judge::LlmJudge;
use toolrun_evals::{EvalError, EvalReport, evaluate};
use toolrun_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use toolrun_test_model::{PresetResponse, TestModelProvider};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the dataset, a JSON array of `{ data, target }` records
    dataset: PathBuf,

    /// Which executor runs the cases
    #[arg(short, long, value_enum, default_value = "multi-turn")]
    mode: Mode,

    /// Also grade final answers with a second model call (multi-turn only)
    #[arg(long)]
    judge: bool,

    /// Model used by the judge
    #[arg(long, default_value = "gpt-4o-mini")]
    judge_model: String,

    /// Step ceiling for multi-turn cases that don't set their own
    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    max_steps: usize,

    /// Replay a scripted model (a JSON array of preset turns) instead of
    /// calling the API
    #[arg(long)]
    script: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    SingleTurn,
    MultiTurn,
}

/// Connection settings read from the environment.
struct OpenAIEnv {
    api_key: String,
    base_url: Option<String>,
    model: Option<String>,
}

impl OpenAIEnv {
    fn from_env() -> Option<Self> {
        Some(Self {
            api_key: env::var("OPENAI_API_KEY").ok()?,
            base_url: env::var("OPENAI_BASE_URL").ok(),
            model: env::var("OPENAI_MODEL").ok(),
        })
    }

    fn provider(&self, model: Option<&str>) -> OpenAIProvider {
        let mut config =
            OpenAIConfigBuilder::with_api_key(self.api_key.as_str());
        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url.as_str());
        }
        if let Some(model) = model.or(self.model.as_deref()) {
            config = config.with_model(model);
        }
        OpenAIProvider::new(config.build())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(&cli).await {
        Ok(report) => {
            print_report(&cli, &report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<EvalReport, EvalError> {
    let openai = OpenAIEnv::from_env();
    let judge = if cli.judge && cli.mode == Mode::MultiTurn {
        let Some(openai) = &openai else {
            return Err(EvalError::Config(
                "OPENAI_API_KEY must be set to use the judge".to_owned(),
            ));
        };
        Some(LlmJudge::new(openai.provider(Some(&cli.judge_model)))?)
    } else {
        None
    };

    if let Some(path) = &cli.script {
        let text = tokio::fs::read_to_string(path).await.map_err(|source| {
            EvalError::Io {
                path: path.clone(),
                source,
            }
        })?;
        let script: Vec<PresetResponse> = serde_json::from_str(&text)?;
        info!("replaying {} scripted turns", script.len());
        let provider = TestModelProvider::with_script(script);
        return run_suite(cli, move |_: Option<&str>| provider.clone(), judge)
            .await;
    }

    let Some(openai) = openai else {
        return Err(EvalError::Config(
            "OPENAI_API_KEY environment variable is not set".to_owned(),
        ));
    };
    let factory = move |model: Option<&str>| openai.provider(model);
    run_suite(cli, factory, judge).await
}

async fn run_suite<F: ProviderFactory>(
    cli: &Cli,
    factory: F,
    judge: Option<LlmJudge>,
) -> Result<EvalReport, EvalError> {
    let system_prompt = toolrun::default_system_prompt();
    match cli.mode {
        Mode::SingleTurn => {
            let cases = load_cases::<EvalData, EvalTarget>(&cli.dataset).await?;
            let executor = SingleTurnExecutor::new(factory, system_prompt);
            let evaluators: Vec<
                Box<dyn Evaluator<SingleTurnResult, EvalTarget>>,
            > = vec![
                Box::new(Metric::new("toolSelection", tool_selection_score)),
                Box::new(Metric::new(
                    "toolsSelected",
                    tools_selected::<SingleTurnResult, EvalTarget>,
                )),
                Box::new(Metric::new(
                    "toolsAvoided",
                    tools_avoided::<SingleTurnResult, EvalTarget>,
                )),
            ];
            Ok(evaluate(&executor, &cases, &evaluators).await)
        }
        Mode::MultiTurn => {
            let cases =
                load_cases::<MultiTurnEvalData, MultiTurnTarget>(&cli.dataset)
                    .await?;
            let executor = MultiTurnExecutor::new(factory, system_prompt)
                .with_max_steps(cli.max_steps);
            let mut evaluators: Vec<
                Box<dyn Evaluator<MultiTurnResult, MultiTurnTarget>>,
            > = vec![
                Box::new(Metric::new("toolOrder", tool_order_correct)),
                Box::new(Metric::new(
                    "toolsAvoided",
                    tools_avoided::<MultiTurnResult, MultiTurnTarget>,
                )),
            ];
            if let Some(judge) = judge {
                evaluators.push(Box::new(judge));
            }
            Ok(evaluate(&executor, &cases, &evaluators).await)
        }
    }
}

fn print_report(cli: &Cli, report: &EvalReport) {
    if cli.json {
        match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("error: {err}"),
        }
        return;
    }

    for case in &report.cases {
        let scores: Vec<_> = case
            .scores
            .iter()
            .map(|(name, score)| format!("{name}={score:.2}"))
            .collect();
        println!("case {}: {}", case.index, scores.join(" "));
        for (name, comment) in &case.comments {
            println!("  {name}: {comment}");
        }
        for err in &case.errors {
            println!("  error: {err}");
        }
    }

    println!("\naverages over {} cases:", report.cases.len());
    for (name, average) in &report.averages {
        println!("  {name}: {average:.3}");
    }
}
