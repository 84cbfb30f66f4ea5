//! A set of built-in tools that models can use.

mod code;
mod date_time;
mod file;
mod shell;
mod web;

pub use code::ExecuteCodeTool;
pub use date_time::GetDateTimeTool;
pub use file::{DeleteFileTool, ListFilesTool, ReadFileTool, WriteFileTool};
pub use shell::RunCommandTool;
pub use web::WebSearchTool;
