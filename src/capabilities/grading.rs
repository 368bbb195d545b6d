use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{required_str, Capability};
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::Tool;

const RUBRIC_EXTENSIONS: [&str; 2] = ["txt", "md"];

/// Shared state for the grading capabilities: where rubrics live and a
/// cache of rubrics already parsed this session.
pub struct GradingStore {
    rubrics_dir: PathBuf,
    cache: Mutex<HashMap<String, String>>,
}

impl GradingStore {
    pub fn new(rubrics_dir: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            rubrics_dir: rubrics_dir.into(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn is_rubric_file(path: &Path) -> bool {
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| RUBRIC_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        let named_rubric = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase().contains("rubric"))
            .unwrap_or(false);
        supported && named_rubric
    }

    fn rubric_files(&self) -> AgentResult<Vec<String>> {
        let entries = std::fs::read_dir(&self.rubrics_dir).map_err(|e| {
            AgentError::ExecutionError(format!("Error reading rubrics directory: {}", e))
        })?;

        let mut rubrics: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && Self::is_rubric_file(path))
            .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        rubrics.sort();
        Ok(rubrics)
    }

    /// Find a rubric whose file name contains every search term and return
    /// its content. Misses come back as guidance text so the model can
    /// correct itself with `list_rubrics`.
    fn load(&self, rubric_name: &str) -> AgentResult<String> {
        if let Some(cached) = self.cache.lock().unwrap().get(rubric_name) {
            return Ok(cached.clone());
        }

        let search_terms: Vec<String> = rubric_name
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        for file in self.rubric_files()? {
            let file_lower = file.to_lowercase();
            if search_terms.iter().all(|term| file_lower.contains(term)) {
                let path = self.rubrics_dir.join(&file);
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    AgentError::ExecutionError(format!("Error reading rubric: {}", e))
                })?;
                let loaded = format!("Rubric: {}\n\n{}", file, content);
                self.cache
                    .lock()
                    .unwrap()
                    .insert(rubric_name.to_string(), loaded.clone());
                return Ok(loaded);
            }
        }

        Ok(format!(
            "Could not find rubric matching '{}'. Use list_rubrics to see available rubrics.",
            rubric_name
        ))
    }

    fn read_submission(&self, submission_path: &str) -> String {
        let path = Path::new(submission_path);
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "txt" | "md" => std::fs::read_to_string(path)
                .unwrap_or_else(|e| format!("Error reading submission: {}", e)),
            "docx" | "pdf" => format!(
                "{} support not yet implemented. Please convert to TXT.",
                ext.to_uppercase()
            ),
            other => format!("Unsupported file format: .{}", other),
        }
    }
}

/// List the rubric files available for grading
pub struct ListRubrics {
    tool: Tool,
    store: Arc<GradingStore>,
}

impl ListRubrics {
    pub fn new(store: Arc<GradingStore>) -> Self {
        Self {
            tool: Tool::new(
                "list_rubrics",
                "List the rubric files available for grading.",
                json!({"type": "object", "properties": {}}),
            ),
            store,
        }
    }
}

#[async_trait]
impl Capability for ListRubrics {
    fn spec(&self) -> &Tool {
        &self.tool
    }

    async fn execute(&self, _arguments: Value) -> AgentResult<Vec<Content>> {
        let rubrics = self.store.rubric_files()?;
        let text = if rubrics.is_empty() {
            "No rubric files found in the rubrics directory.".to_string()
        } else {
            let listing: Vec<String> = rubrics.iter().map(|r| format!("  - {}", r)).collect();
            format!("Available rubrics:\n{}", listing.join("\n"))
        };
        Ok(vec![Content::text(text)])
    }
}

/// Load a rubric by (partial) name
pub struct LoadRubric {
    tool: Tool,
    store: Arc<GradingStore>,
}

impl LoadRubric {
    pub fn new(store: Arc<GradingStore>) -> Self {
        Self {
            tool: Tool::new(
                "load_rubric",
                "Load a grading rubric by name. Partial names match if every word appears in the file name.",
                json!({
                    "type": "object",
                    "properties": {
                        "rubric_name": {"type": "string", "description": "Name (or part of the name) of the rubric to load."}
                    },
                    "required": ["rubric_name"]
                }),
            ),
            store,
        }
    }
}

#[async_trait]
impl Capability for LoadRubric {
    fn spec(&self) -> &Tool {
        &self.tool
    }

    async fn execute(&self, arguments: Value) -> AgentResult<Vec<Content>> {
        let rubric_name = required_str(&arguments, "rubric_name")?;
        let content = self.store.load(rubric_name)?;
        Ok(vec![Content::text(content)])
    }
}

/// Pair a submission with a rubric and instructions so the model can grade it
pub struct GradeSubmission {
    tool: Tool,
    store: Arc<GradingStore>,
}

impl GradeSubmission {
    pub fn new(store: Arc<GradingStore>) -> Self {
        Self {
            tool: Tool::new(
                "grade_submission",
                "Load a student submission together with a rubric so it can be graded.",
                json!({
                    "type": "object",
                    "properties": {
                        "submission_path": {"type": "string", "description": "Path to the student submission."},
                        "rubric_name": {"type": "string", "description": "Name of the rubric to grade against."}
                    },
                    "required": ["submission_path", "rubric_name"]
                }),
            ),
            store,
        }
    }
}

#[async_trait]
impl Capability for GradeSubmission {
    fn spec(&self) -> &Tool {
        &self.tool
    }

    async fn execute(&self, arguments: Value) -> AgentResult<Vec<Content>> {
        let submission_path = required_str(&arguments, "submission_path")?;
        let rubric_name = required_str(&arguments, "rubric_name")?;

        let rubric_content = self.store.load(rubric_name)?;
        let submission_content = self.store.read_submission(submission_path);

        Ok(vec![Content::text(format!(
            "=== RUBRIC ===\n{}\n\n=== STUDENT SUBMISSION ===\n{}\n\n\
             === GRADING INSTRUCTIONS ===\n\
             Please evaluate the student submission against the rubric criteria above.\n\
             For each criterion, assign a score and provide specific feedback.\n\
             Calculate the total score and provide an overall assessment.",
            rubric_content, submission_content
        ))])
    }
}

/// All grading capabilities over one shared store
pub fn capabilities(rubrics_dir: impl Into<PathBuf>) -> Vec<Arc<dyn Capability>> {
    let store = GradingStore::new(rubrics_dir);
    vec![
        Arc::new(ListRubrics::new(store.clone())),
        Arc::new(LoadRubric::new(store.clone())),
        Arc::new(GradeSubmission::new(store)),
    ]
}
