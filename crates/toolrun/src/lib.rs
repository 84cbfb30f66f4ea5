//! An out-of-the-box agent that assembles the built-in tools and a model
//! provider.
//!
//! The crate includes a CLI tool for chatting in the terminal. You can also
//! use it as a library to bring the agent loop into your own host apps.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod session;
pub mod tools;

pub use session::{Session, SessionBuilder};

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("./system_prompt.md");

/// Returns the bundled system prompt, filled in for the current host.
pub fn default_system_prompt() -> String {
    SYSTEM_PROMPT_TEMPLATE.replace("{{HOST_OS}}", host_os())
}

#[inline]
fn host_os() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "macOS",
        "windows" => "Windows",
        _ => "some other OS",
    }
}

/// Re-exports of [`toolrun_core`] crate.
pub mod core {
    pub use toolrun_core::*;
}
