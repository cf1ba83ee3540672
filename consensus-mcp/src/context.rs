//! File and image context for prompts.
//!
//! Files are read from disk and rendered as delimited text blocks. A file that
//! cannot be read becomes an inline error marker so the model still sees which
//! path was meant; it never fails the tool call.

use std::path::Path;

use tracing::warn;

use crate::providers::Message;

/// Upper bound on bytes read from a single file
pub const MAX_FILE_BYTES: usize = 1024 * 1024;

/// Rough characters-per-token ratio used for budgeting prompts
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimated token count of a message list
pub fn estimate_tokens(messages: &[Message]) -> u64 {
    let chars: usize = messages.iter().map(|m| m.content.chars().count()).sum();
    chars.div_ceil(CHARS_PER_TOKEN) as u64
}

/// Rendered files and image references for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptContext {
    pub files: Option<String>,
    pub images: Option<String>,
}

impl PromptContext {
    /// Append files, then images, each in its own delimited block
    pub fn apply(&self, prompt: &str) -> String {
        let mut out = with_context(prompt, self.files.as_deref());
        if let Some(images) = self.images.as_deref() {
            out.push_str("\n\n");
            out.push_str(images);
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_file_bytes: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            max_file_bytes: MAX_FILE_BYTES,
        }
    }
}

impl ContextAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_file_bytes(mut self, max: usize) -> Self {
        self.max_file_bytes = max;
        self
    }

    /// Render `paths` as one text block, or `None` when there are none
    pub async fn files_block(&self, paths: &[String]) -> Option<String> {
        if paths.is_empty() {
            return None;
        }
        let mut block = String::new();
        for path in paths {
            block.push_str(&self.render_file(path).await);
            block.push('\n');
        }
        Some(block.trim_end().to_string())
    }

    async fn render_file(&self, path: &str) -> String {
        match tokio::fs::read(Path::new(path)).await {
            Ok(bytes) => {
                let truncated = bytes.len() > self.max_file_bytes;
                let slice = &bytes[..bytes.len().min(self.max_file_bytes)];
                let mut text = String::from_utf8_lossy(slice).into_owned();
                if truncated {
                    text.push_str(&format!(
                        "\n[... truncated after {} bytes ...]",
                        self.max_file_bytes
                    ));
                }
                format!(
                    "--- BEGIN FILE: {} ---\n{}\n--- END FILE: {} ---",
                    path,
                    text.trim_end(),
                    path
                )
            }
            Err(e) => {
                warn!("Could not read context file {}: {}", path, e);
                format!("--- ERROR READING FILE: {} ({}) ---", path, e)
            }
        }
    }

    /// Files and images for one request
    pub async fn assemble(&self, files: &[String], images: &[String]) -> PromptContext {
        PromptContext {
            files: self.files_block(files).await,
            images: self.images_block(images),
        }
    }

    /// List image references; images are passed by path, not inlined
    pub fn images_block(&self, images: &[String]) -> Option<String> {
        if images.is_empty() {
            return None;
        }
        let list: Vec<String> = images.iter().map(|i| format!("- {}", i)).collect();
        Some(format!("=== IMAGES ===\n{}\n=== END IMAGES ===", list.join("\n")))
    }
}

/// Append a context block to a prompt using the standard delimiters
pub fn with_context(prompt: &str, context: Option<&str>) -> String {
    match context {
        Some(ctx) if !ctx.is_empty() => {
            format!("{}\n\n=== CONTEXT FILES ===\n{}\n=== END CONTEXT ===", prompt, ctx)
        }
        _ => prompt.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_files_block_reads_and_delimits() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "fn main() {{}}").unwrap();
        let path = file.path().display().to_string();

        let block = ContextAssembler::new()
            .files_block(&[path.clone()])
            .await
            .unwrap();
        assert!(block.starts_with(&format!("--- BEGIN FILE: {} ---", path)));
        assert!(block.contains("fn main() {}"));
        assert!(block.ends_with(&format!("--- END FILE: {} ---", path)));
    }

    #[tokio::test]
    async fn test_missing_file_becomes_marker() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.rs").display().to_string();
        let block = ContextAssembler::new()
            .files_block(&[missing.clone()])
            .await
            .unwrap();
        assert!(block.starts_with(&format!("--- ERROR READING FILE: {}", missing)));
    }

    #[tokio::test]
    async fn test_large_file_is_truncated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[b'a'; 64]).unwrap();
        let path = file.path().display().to_string();

        let block = ContextAssembler::new()
            .with_max_file_bytes(16)
            .files_block(&[path])
            .await
            .unwrap();
        assert!(block.contains(&"a".repeat(16)));
        assert!(!block.contains(&"a".repeat(17)));
        assert!(block.contains("truncated after 16 bytes"));
    }

    #[tokio::test]
    async fn test_empty_inputs_yield_none() {
        let ctx = ContextAssembler::new();
        assert!(ctx.files_block(&[]).await.is_none());
        assert!(ctx.images_block(&[]).is_none());
    }

    #[test]
    fn test_images_sit_outside_the_files_block() {
        let ctx = PromptContext {
            files: Some("--- BEGIN FILE: a.rs ---\nx\n--- END FILE: a.rs ---".into()),
            images: ContextAssembler::new().images_block(&["/tmp/diagram.png".to_string()]),
        };
        let prompt = ctx.apply("q");
        let end_files = prompt.find("=== END CONTEXT ===").unwrap();
        let images = prompt.find("=== IMAGES ===").unwrap();
        assert!(images > end_files);
        assert!(prompt.ends_with("- /tmp/diagram.png\n=== END IMAGES ==="));

        let images_only = PromptContext {
            files: None,
            images: ctx.images.clone(),
        };
        let prompt = images_only.apply("q");
        assert!(!prompt.contains("=== CONTEXT FILES ==="));
        assert!(prompt.starts_with("q\n\n=== IMAGES ==="));
        assert_eq!(PromptContext::default().apply("q"), "q");
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(&[]), 0);
        assert_eq!(estimate_tokens(&[Message::user("abcd")]), 1);
        assert_eq!(
            estimate_tokens(&[Message::system("abcd"), Message::user("abcde")]),
            3
        );
    }

    #[test]
    fn test_with_context() {
        assert_eq!(with_context("q", None), "q");
        assert_eq!(
            with_context("q", Some("body")),
            "q\n\n=== CONTEXT FILES ===\nbody\n=== END CONTEXT ==="
        );
    }
}
