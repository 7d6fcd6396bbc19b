//! Signal providers (caption, OCR, OCR question-answer)
//!
//! Each signal comes from an external model. The production provider runs one
//! Python script per signal with the image path as its only argument and
//! parses the JSON the script prints on stdout:
//!
//! | Signal  | Expected stdout                              | Result                    |
//! |---------|----------------------------------------------|---------------------------|
//! | caption | `[{"generated_text": "..."}]`                | first `generated_text`    |
//! | OCR     | any JSON                                     | all string leaves, joined |
//! | OCR-QA  | `{"question": "...", "answer": "..."}`       | `answer`                  |

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Signal provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Script could not be started
    #[error("Failed to run {script}: {message}")]
    Spawn { script: String, message: String },

    /// Script exited unsuccessfully
    #[error("{script} exited with {code:?}: {stderr}")]
    Failed {
        script: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Script output was not the expected structured response
    #[error("Unexpected output from {script}: {message}")]
    Parse { script: String, message: String },
}

/// External caption/OCR/OCR-QA signal sources
#[async_trait]
pub trait SignalProvider: Send + Sync {
    /// Natural-language caption for the image
    async fn caption(&self, file: &Path) -> Result<String, ProviderError>;

    /// All text found in the image
    async fn ocr(&self, file: &Path) -> Result<String, ProviderError>;

    /// Answer to "what does the logo say?"
    async fn ocr_qa(&self, file: &Path) -> Result<String, ProviderError>;
}

/// Interpreter and script locations for [`ScriptSignalProvider`]
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub python: String,
    pub caption_script: PathBuf,
    /// May point at a handwritten-text model; its `["..."]` output is
    /// handled by the same leaf concatenation
    pub ocr_script: PathBuf,
    pub ocr_qa_script: PathBuf,
}

impl ProviderConfig {
    /// Default script names inside a scripts directory
    pub fn from_scripts_dir(python: impl Into<String>, scripts_dir: &Path) -> Self {
        Self {
            python: python.into(),
            caption_script: scripts_dir.join("caption.py"),
            ocr_script: scripts_dir.join("ocr.py"),
            ocr_qa_script: scripts_dir.join("ocr-qa.py"),
        }
    }
}

/// Provider that shells out to the model scripts
pub struct ScriptSignalProvider {
    config: ProviderConfig,
}

impl ScriptSignalProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Run `<python> <script> <file>` and return stdout
    async fn run_script(&self, script: &Path, file: &Path) -> Result<String, ProviderError> {
        let script_name = script.display().to_string();

        tracing::debug!(script = %script_name, file = %file.display(), "Running provider script");

        let output = tokio::task::spawn_blocking({
            let python = self.config.python.clone();
            let script = script.to_path_buf();
            let file = file.to_path_buf();

            move || Command::new(&python).arg(&script).arg(&file).output()
        })
        .await
        .map_err(|e| ProviderError::Spawn {
            script: script_name.clone(),
            message: format!("Task join error: {}", e),
        })?
        .map_err(|e| ProviderError::Spawn {
            script: script_name.clone(),
            message: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            tracing::error!(
                script = %script_name,
                code = ?output.status.code(),
                stdout = %String::from_utf8_lossy(&output.stdout),
                stderr = %stderr,
                "Provider script failed"
            );
            return Err(ProviderError::Failed {
                script: script_name,
                code: output.status.code(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn run_and_parse(
        &self,
        script: &Path,
        file: &Path,
        parse: fn(&str) -> Result<String, String>,
    ) -> Result<String, ProviderError> {
        let stdout = self.run_script(script, file).await?;
        parse(&stdout).map_err(|message| ProviderError::Parse {
            script: script.display().to_string(),
            message,
        })
    }
}

#[async_trait]
impl SignalProvider for ScriptSignalProvider {
    async fn caption(&self, file: &Path) -> Result<String, ProviderError> {
        self.run_and_parse(&self.config.caption_script, file, parse_caption_output)
            .await
    }

    async fn ocr(&self, file: &Path) -> Result<String, ProviderError> {
        self.run_and_parse(&self.config.ocr_script, file, parse_ocr_output)
            .await
    }

    async fn ocr_qa(&self, file: &Path) -> Result<String, ProviderError> {
        self.run_and_parse(&self.config.ocr_qa_script, file, parse_ocr_qa_output)
            .await
    }
}

#[derive(Deserialize)]
struct GeneratedText {
    generated_text: Value,
}

#[derive(Deserialize)]
struct QuestionAnswer {
    answer: Value,
}

/// `[{"generated_text": "..."}]` → text
pub fn parse_caption_output(stdout: &str) -> Result<String, String> {
    let parsed: Vec<GeneratedText> = serde_json::from_str(stdout.trim())
        .map_err(|e| format!("Failed to parse JSON ({}): {}", e, stdout))?;
    let first = parsed
        .into_iter()
        .next()
        .ok_or_else(|| format!("Empty caption list: {}", stdout))?;
    match first.generated_text {
        Value::String(text) => Ok(text),
        other => Err(format!("Expected string, got {}", other)),
    }
}

/// Any JSON → every string leaf concatenated in document order
pub fn parse_ocr_output(stdout: &str) -> Result<String, String> {
    let value: Value = serde_json::from_str(stdout.trim())
        .map_err(|e| format!("Failed to parse JSON ({}): {}", e, stdout))?;
    let mut text = String::new();
    concatenate_string_leaves(&value, &mut text);
    Ok(text)
}

/// `{"question": "...", "answer": "..."}` → answer
pub fn parse_ocr_qa_output(stdout: &str) -> Result<String, String> {
    let parsed: QuestionAnswer = serde_json::from_str(stdout.trim())
        .map_err(|e| format!("Failed to parse JSON ({}): {}", e, stdout))?;
    match parsed.answer {
        Value::String(answer) => Ok(answer),
        other => Err(format!("Expected string answer, got {}", other)),
    }
}

fn concatenate_string_leaves(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(items) => items.iter().for_each(|v| concatenate_string_leaves(v, out)),
        Value::Object(map) => map.values().for_each(|v| concatenate_string_leaves(v, out)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_output_parsing() {
        let stdout = "[{\"generated_text\": \"a dog on a couch\"}]\n";
        assert_eq!(parse_caption_output(stdout).unwrap(), "a dog on a couch");
    }

    #[test]
    fn test_caption_output_rejects_wrong_shape() {
        assert!(parse_caption_output("{\"generated_text\": \"x\"}").is_err());
        assert!(parse_caption_output("[{\"generated_text\": 5}]").is_err());
        assert!(parse_caption_output("[]").is_err());
        assert!(parse_caption_output("Traceback (most recent call last)").is_err());
    }

    #[test]
    fn test_ocr_output_concatenates_leaves_in_order() {
        let stdout = r#"{"menu": [{"nm": "ACME"}, {"nm": " Corp", "price": 12}], "total": {"z": "!"}}"#;
        assert_eq!(parse_ocr_output(stdout).unwrap(), "ACME Corp!");
    }

    #[test]
    fn test_ocr_output_accepts_handwritten_list() {
        assert_eq!(parse_ocr_output("[\"Dear John\"]").unwrap(), "Dear John");
        assert_eq!(parse_ocr_output("{}").unwrap(), "");
    }

    #[test]
    fn test_ocr_qa_output() {
        let stdout = r#"{"question": "What does the logo say?", "answer": "ACME"}"#;
        assert_eq!(parse_ocr_qa_output(stdout).unwrap(), "ACME");
        assert!(parse_ocr_qa_output(r#"{"question": "q"}"#).is_err());
    }

    #[test]
    fn test_scripts_dir_layout() {
        let config = ProviderConfig::from_scripts_dir("python3", Path::new("/opt/models"));
        assert_eq!(config.caption_script, Path::new("/opt/models/caption.py"));
        assert_eq!(config.ocr_script, Path::new("/opt/models/ocr.py"));
        assert_eq!(config.ocr_qa_script, Path::new("/opt/models/ocr-qa.py"));
    }
}
