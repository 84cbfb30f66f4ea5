//! Offline and live evaluations of the `toolrun` agent loop.
//!
//! A dataset is a JSON array of `{ "data", "target" }` records. An
//! [`Executor`](executors::Executor) turns each `data` into an output, then
//! every [`Evaluator`](evaluators::Evaluator) scores that output against
//! `target`. Two executors exist:
//!
//! - [`SingleTurnExecutor`](executors::SingleTurnExecutor) asks the model
//!   once and records which of the offered tools it picks.
//! - [`MultiTurnExecutor`](executors::MultiTurnExecutor) runs the full loop
//!   against mocked tools and records the whole transcript.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

pub mod dataset;
mod error;
pub mod evaluators;
pub mod executors;
pub mod judge;
mod runner;

pub use error::EvalError;
pub use runner::{CaseReport, EvalReport, evaluate};
