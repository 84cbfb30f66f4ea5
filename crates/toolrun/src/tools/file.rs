use std::path::Path;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tokio::fs;
use toolrun_core::tool::{Error as ToolError, Tool, ToolResult};

fn io_error(action: &str, path: &str, err: std::io::Error) -> ToolError {
    ToolError::execution_error()
        .with_reason(format!("Could not {action} `{path}`: {err}"))
}

#[derive(Deserialize, JsonSchema)]
pub struct ReadFileParameters {
    #[schemars(description = "Path of the file to read.")]
    path: String,
}

/// A tool for reading the whole content of a text file.
pub struct ReadFileTool {
    parameter_schema: Value,
}

impl ReadFileTool {
    /// Creates a new read file tool.
    #[inline]
    pub fn new() -> Self {
        ReadFileTool {
            parameter_schema: schema_for!(ReadFileParameters).to_value(),
        }
    }
}

impl Default for ReadFileTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for ReadFileTool {
    type Input = ReadFileParameters;

    fn name(&self) -> &str {
        "readFile"
    }

    fn description(&self) -> &str {
        "Reads the file at the given path and returns its contents."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: ReadFileParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            fs::read_to_string(&input.path)
                .await
                .map_err(|err| io_error("read", &input.path, err))
        }
    }
}

#[derive(Deserialize, JsonSchema)]
pub struct WriteFileParameters {
    #[schemars(description = "Path of the file to write.")]
    path: String,
    #[schemars(description = "Content to write to the file.")]
    content: String,
}

/// A tool for creating or overwriting a file.
pub struct WriteFileTool {
    parameter_schema: Value,
}

impl WriteFileTool {
    /// Creates a new write file tool.
    #[inline]
    pub fn new() -> Self {
        WriteFileTool {
            parameter_schema: schema_for!(WriteFileParameters).to_value(),
        }
    }
}

impl Default for WriteFileTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for WriteFileTool {
    type Input = WriteFileParameters;

    fn name(&self) -> &str {
        "writeFile"
    }

    fn description(&self) -> &str {
        r#"
Writes content to the file at the given path. The file is created if it does not exist and overwritten if it does.
Missing parent directories are created."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: WriteFileParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            let path = Path::new(&input.path);
            let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
            if let Some(parent) = parent {
                fs::create_dir_all(parent).await.map_err(|err| {
                    io_error("create the parent directory of", &input.path, err)
                })?;
            }
            fs::write(path, &input.content)
                .await
                .map_err(|err| io_error("write", &input.path, err))?;
            Ok(format!(
                "Wrote {} characters to {}",
                input.content.chars().count(),
                input.path
            ))
        }
    }
}

fn default_directory() -> String {
    ".".to_owned()
}

#[derive(Deserialize, JsonSchema)]
pub struct ListFilesParameters {
    #[schemars(description = "The directory to list, defaults to `.`.")]
    #[serde(default = "default_directory")]
    directory: String,
}

/// A tool for listing the entries of a directory.
pub struct ListFilesTool {
    parameter_schema: Value,
}

impl ListFilesTool {
    /// Creates a new list files tool.
    #[inline]
    pub fn new() -> Self {
        ListFilesTool {
            parameter_schema: schema_for!(ListFilesParameters).to_value(),
        }
    }
}

impl Default for ListFilesTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for ListFilesTool {
    type Input = ListFilesParameters;

    fn name(&self) -> &str {
        "listFiles"
    }

    fn description(&self) -> &str {
        r#"
Lists the entries of a directory, one per line, as `dir NAME` or `file NAME`.
Entries are sorted by name."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: ListFilesParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            list_directory(&input.directory)
                .await
                .map_err(|err| io_error("list", &input.directory, err))
        }
    }
}

async fn list_directory(directory: &str) -> std::io::Result<String> {
    let mut read_dir = fs::read_dir(directory).await?;
    let mut entries = vec![];
    while let Some(entry) = read_dir.next_entry().await? {
        let kind = if entry.file_type().await?.is_dir() {
            "dir"
        } else {
            "file"
        };
        entries.push((entry.file_name().to_string_lossy().into_owned(), kind));
    }
    if entries.is_empty() {
        return Ok(format!("Directory {directory} is empty"));
    }

    // `read_dir` order is platform dependent.
    entries.sort();
    let lines: Vec<_> = entries
        .into_iter()
        .map(|(name, kind)| format!("{kind} {name}"))
        .collect();
    Ok(lines.join("\n"))
}

#[derive(Deserialize, JsonSchema)]
pub struct DeleteFileParameters {
    #[schemars(description = "Path of the file to delete.")]
    path: String,
}

/// A tool for deleting a single file.
pub struct DeleteFileTool {
    parameter_schema: Value,
}

impl DeleteFileTool {
    /// Creates a new delete file tool.
    #[inline]
    pub fn new() -> Self {
        DeleteFileTool {
            parameter_schema: schema_for!(DeleteFileParameters).to_value(),
        }
    }
}

impl Default for DeleteFileTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for DeleteFileTool {
    type Input = DeleteFileParameters;

    fn name(&self) -> &str {
        "deleteFile"
    }

    fn description(&self) -> &str {
        "Deletes the file at the given path. Use with caution, this cannot be undone."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: DeleteFileParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            fs::remove_file(&input.path)
                .await
                .map_err(|err| io_error("delete", &input.path, err))?;
            Ok(format!("Deleted the file at {}", input.path))
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn path_str(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes/today/todo.md");

        let result = WriteFileTool::new()
            .execute(WriteFileParameters {
                path: path_str(&path),
                content: "- buy milk\n".to_owned(),
            })
            .await
            .unwrap();
        assert!(result.starts_with("Wrote 11 characters to "));
        assert!(path.is_file());

        let content = ReadFileTool::new()
            .execute(ReadFileParameters {
                path: path_str(&path),
            })
            .await
            .unwrap();
        assert_eq!(content, "- buy milk\n");
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let err = ReadFileTool::new()
            .execute(ReadFileParameters {
                path: path_str(&dir.path().join("nope.txt")),
            })
            .await
            .unwrap_err();
        assert!(err.reason().starts_with("Could not read"));
    }

    #[tokio::test]
    async fn test_list_files() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();

        let tool = ListFilesTool::new();
        let list = || {
            tool.execute(ListFilesParameters {
                directory: path_str(dir.path()),
            })
        };
        let first = list().await.unwrap();
        assert_eq!(first, "file a.txt\nfile b.txt\ndir src");
        assert_eq!(list().await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_list_empty_directory() {
        let dir = tempdir().unwrap();
        let directory = path_str(dir.path());
        let result = ListFilesTool::new()
            .execute(ListFilesParameters {
                directory: directory.clone(),
            })
            .await
            .unwrap();
        assert_eq!(result, format!("Directory {directory} is empty"));
    }

    #[test]
    fn test_list_defaults_to_current_directory() {
        let input: ListFilesParameters =
            serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(input.directory, ".");
    }

    #[tokio::test]
    async fn test_delete_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.log");
        std::fs::write(&path, "x").unwrap();

        let tool = DeleteFileTool::new();
        let delete = || {
            tool.execute(DeleteFileParameters {
                path: path_str(&path),
            })
        };
        delete().await.unwrap();
        assert!(!path.exists());
        assert!(delete().await.is_err());
    }
}
