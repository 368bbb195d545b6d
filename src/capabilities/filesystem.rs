use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};
use walkdir::WalkDir;

use super::{required_str, Capability};
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::Tool;

// Keeps a pathological file from blowing out the model context
const READ_LIMIT: usize = 10_000;
const SEARCH_LIMIT: usize = 50;

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Read a file's contents, truncated past a fixed size
pub struct FileRead {
    tool: Tool,
}

impl FileRead {
    pub fn new() -> Self {
        Self {
            tool: Tool::new(
                "file_read",
                "Read the contents of a file.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Path of the file to read."}
                    },
                    "required": ["path"]
                }),
            ),
        }
    }
}

impl Default for FileRead {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for FileRead {
    fn spec(&self) -> &Tool {
        &self.tool
    }

    async fn execute(&self, arguments: Value) -> AgentResult<Vec<Content>> {
        let path = expand(required_str(&arguments, "path")?);
        let mut content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AgentError::ExecutionError(format!("Error reading file: {}", e)))?;

        if content.len() > READ_LIMIT {
            let mut cut = READ_LIMIT;
            while !content.is_char_boundary(cut) {
                cut -= 1;
            }
            content.truncate(cut);
            content.push_str("\n... (truncated, file too large)");
        }
        Ok(vec![Content::text(content)])
    }
}

/// Write content to a file, creating parent directories as needed
pub struct FileWrite {
    tool: Tool,
}

impl FileWrite {
    pub fn new() -> Self {
        Self {
            tool: Tool::new(
                "file_write",
                "Write content to a file, creating it if needed.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Path of the file to write."},
                        "content": {"type": "string", "description": "The content to write."}
                    },
                    "required": ["path", "content"]
                }),
            ),
        }
    }
}

impl Default for FileWrite {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for FileWrite {
    fn spec(&self) -> &Tool {
        &self.tool
    }

    async fn execute(&self, arguments: Value) -> AgentResult<Vec<Content>> {
        let path = expand(required_str(&arguments, "path")?);
        let content = required_str(&arguments, "content")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    AgentError::ExecutionError(format!("Error creating directories: {}", e))
                })?;
            }
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| AgentError::ExecutionError(format!("Error writing file: {}", e)))?;

        Ok(vec![Content::text(format!(
            "Successfully wrote {} bytes to {}",
            content.len(),
            path.display()
        ))])
    }
}

/// List a directory's entries with sizes
pub struct FileList {
    tool: Tool,
}

impl FileList {
    pub fn new() -> Self {
        Self {
            tool: Tool::new(
                "file_list",
                "List the contents of a directory.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {"type": "string", "description": "Path of the directory to list. Defaults to the current directory."}
                    }
                }),
            ),
        }
    }
}

impl Default for FileList {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for FileList {
    fn spec(&self) -> &Tool {
        &self.tool
    }

    async fn execute(&self, arguments: Value) -> AgentResult<Vec<Content>> {
        let path = expand(arguments.get("path").and_then(|v| v.as_str()).unwrap_or("."));

        let mut read_dir = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| AgentError::ExecutionError(format!("Error listing directory: {}", e)))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| AgentError::ExecutionError(format!("Error listing directory: {}", e)))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            match entry.metadata().await {
                Ok(meta) if meta.is_dir() => entries.push(format!("[DIR] {}/", name)),
                Ok(meta) => entries.push(format!("[FILE] {} ({} bytes)", name, meta.len())),
                Err(_) => entries.push(format!("[FILE] {}", name)),
            }
        }
        entries.sort();

        let listing = if entries.is_empty() {
            "(empty directory)".to_string()
        } else {
            entries.join("\n")
        };
        Ok(vec![Content::text(listing)])
    }
}

/// Recursively search a directory for file names containing a pattern
pub struct FileSearch {
    tool: Tool,
}

impl FileSearch {
    pub fn new() -> Self {
        Self {
            tool: Tool::new(
                "file_search",
                "Search a directory tree for files whose name contains a pattern.",
                json!({
                    "type": "object",
                    "properties": {
                        "directory": {"type": "string", "description": "Directory to search under."},
                        "pattern": {"type": "string", "description": "Substring to look for in file names, case-insensitive."}
                    },
                    "required": ["directory", "pattern"]
                }),
            ),
        }
    }
}

impl Default for FileSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for FileSearch {
    fn spec(&self) -> &Tool {
        &self.tool
    }

    async fn execute(&self, arguments: Value) -> AgentResult<Vec<Content>> {
        let directory = expand(required_str(&arguments, "directory")?);
        let pattern = required_str(&arguments, "pattern")?.to_lowercase();

        let matches: Vec<String> = WalkDir::new(&directory)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .to_lowercase()
                    .contains(&pattern)
            })
            .map(|entry| entry.path().display().to_string())
            .collect();

        if matches.is_empty() {
            return Ok(vec![Content::text(format!(
                "No files matching '{}' found in {}",
                pattern,
                directory.display()
            ))]);
        }

        let mut result = vec![format!("Found {} files:", matches.len())];
        for path in matches.iter().take(SEARCH_LIMIT) {
            result.push(format!("  {}", path));
        }
        if matches.len() > SEARCH_LIMIT {
            result.push(format!("  ... and {} more", matches.len() - SEARCH_LIMIT));
        }
        Ok(vec![Content::text(result.join("\n"))])
    }
}

/// All filesystem capabilities, ready for registration
pub fn capabilities() -> Vec<std::sync::Arc<dyn Capability>> {
    vec![
        std::sync::Arc::new(FileRead::new()),
        std::sync::Arc::new(FileWrite::new()),
        std::sync::Arc::new(FileList::new()),
        std::sync::Arc::new(FileSearch::new()),
    ]
}
