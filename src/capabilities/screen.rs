use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use xcap::Monitor;

use super::Capability;
use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::tool::Tool;

/// Capture the primary monitor to a PNG file, optionally handing the image
/// back to the model as well.
pub struct ScreenCapture {
    tool: Tool,
}

impl ScreenCapture {
    pub fn new() -> Self {
        Self {
            tool: Tool::new(
                "screen_capture",
                "Take a screenshot of the primary display and save it as a PNG file.",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Where to save the screenshot. Defaults to screenshot.png."
                        },
                        "include_image": {
                            "type": "boolean",
                            "description": "Also return the image itself so it can be inspected."
                        }
                    }
                }),
            ),
        }
    }

    fn capture(path: &str) -> AgentResult<(u32, u32)> {
        let monitors = Monitor::all()
            .map_err(|e| AgentError::ExecutionError(format!("Error enumerating monitors: {}", e)))?;
        let monitor = monitors
            .iter()
            .find(|m| m.is_primary())
            .or_else(|| monitors.first())
            .ok_or_else(|| AgentError::ExecutionError("No monitor available".into()))?;

        let image = monitor
            .capture_image()
            .map_err(|e| AgentError::ExecutionError(format!("Error capturing screen: {}", e)))?;
        image
            .save(path)
            .map_err(|e| AgentError::ExecutionError(format!("Error saving screenshot: {}", e)))?;

        Ok((image.width(), image.height()))
    }
}

impl Default for ScreenCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for ScreenCapture {
    fn spec(&self) -> &Tool {
        &self.tool
    }

    async fn execute(&self, arguments: Value) -> AgentResult<Vec<Content>> {
        let path = match arguments.get("path") {
            None | Some(Value::Null) => "screenshot.png".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(AgentError::InvalidParameters(format!(
                    "'path' must be a string, got {}",
                    other
                )))
            }
        };
        let include_image = arguments
            .get("include_image")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        // Capture is blocking platform work, keep it off the async workers
        let capture_path = path.clone();
        let (width, height) = tokio::task::spawn_blocking(move || Self::capture(&capture_path))
            .await
            .map_err(|e| AgentError::ExecutionError(format!("Screenshot task failed: {}", e)))??;

        let mut contents = vec![Content::text(format!(
            "Screenshot saved to {} ({}x{})",
            path, width, height
        ))];

        if include_image {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| AgentError::ExecutionError(format!("Error reading screenshot: {}", e)))?;
            contents.push(Content::image(BASE64.encode(bytes), "image/png"));
        }

        Ok(contents)
    }
}
