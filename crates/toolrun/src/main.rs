//! A terminal chat that demonstrates how to use `toolrun` as a library.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::process::ExitCode;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde_json::Value;
use tokio::io::{self, AsyncBufReadExt};
use toolrun::SessionBuilder;
use toolrun::core::AgentCallbacks;
use toolrun_openai_model::{OpenAIConfigBuilder, OpenAIProvider};

const BAR_CHAR: &str = "▎";
const MAX_RESULT_PREVIEW: usize = 200;

/// Renders the agent activity in the terminal.
struct Terminal {
    style: ProgressStyle,
    spinner: Option<ProgressBar>,
    streaming: bool,
}

impl Terminal {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        Self {
            style,
            spinner: None,
            streaming: false,
        }
    }

    fn start_thinking(&mut self) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(self.style.clone());
        spinner.set_message("🤔 Thinking...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }

    // Finish the spinner before printing anything else.
    fn stop_thinking(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn end_stream(&mut self) {
        if self.streaming {
            println!();
            self.streaming = false;
        }
    }
}

impl AgentCallbacks for Terminal {
    fn on_token(&mut self, text: &str) {
        self.stop_thinking();
        if !self.streaming {
            print!("{}🤖 ", BAR_CHAR.bright_cyan());
            self.streaming = true;
        }
        print!("{}", text.bright_white());
        std::io::stdout().flush().ok();
    }

    fn on_tool_call_start(&mut self, name: &str, arguments: &Value) {
        self.stop_thinking();
        self.end_stream();
        println!(
            "{}🔧 {} {}",
            BAR_CHAR.bright_yellow(),
            name.bright_white().bold(),
            arguments.dimmed()
        );
    }

    fn on_tool_call_end(&mut self, _name: &str, result: &str) {
        let preview: String = result.chars().take(MAX_RESULT_PREVIEW).collect();
        let ellipsis = if preview.len() < result.len() { "…" } else { "" };
        println!(
            "{}{}{ellipsis}",
            BAR_CHAR.bright_yellow(),
            preview.replace('\n', " ").dimmed()
        );
        self.start_thinking();
    }

    fn on_complete(&mut self, _full_text: &str) {
        self.stop_thinking();
        self.end_stream();
        println!();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Ok(api_key) = env::var("OPENAI_API_KEY") else {
        eprintln!("OPENAI_API_KEY environment variable is not set");
        return ExitCode::FAILURE;
    };
    let mut config = OpenAIConfigBuilder::with_api_key(api_key);
    if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    if let Ok(model) = env::var("OPENAI_MODEL") {
        config = config.with_model(model);
    }
    let model_provider = OpenAIProvider::new(config.build());

    let session = SessionBuilder::with_model_provider(model_provider)
        .with_system_prompt(toolrun::default_system_prompt())
        .build();
    let mut session = match session {
        Ok(session) => session,
        Err(err) => {
            eprintln!("failed to set up the session: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut terminal = Terminal::new();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        terminal.start_thinking();
        let result = session.send_message(line, &mut terminal).await;
        terminal.stop_thinking();
        terminal.end_stream();
        if let Err(err) = result {
            eprintln!("{} {err}", "error:".bright_red().bold());
        }
    }

    ExitCode::SUCCESS
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
