//! Markdown 文档组装

use crate::explainer::Explanation;
use extract::LogicalSource;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// 文档写入失败，整个请求失败
#[derive(Error, Debug)]
#[error("failed to write artifact {}: {source}", .path.display())]
pub struct ArtifactWriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl ArtifactWriteError {
    pub fn new(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

pub const DOCUMENT_TITLE: &str = "VBA Macro Documentation";
pub const NO_CODE_FOUND: &str = "No VBA macro code was found in the uploaded file.";
pub const DIAGRAM_UNAVAILABLE: &str = "Diagram unavailable.";

/// 文档中引用的图
#[derive(Debug, Clone)]
struct DiagramSection<'a> {
    title: &'a str,
    /// 相对文档的文件名，渲染失败时为 None
    file_name: Option<&'a str>,
}

/// 文档组装器
pub struct DocumentAssembler<'a> {
    source: &'a LogicalSource,
    explanation: Option<&'a Explanation>,
    diagrams: Vec<DiagramSection<'a>>,
}

impl<'a> DocumentAssembler<'a> {
    pub fn new(source: &'a LogicalSource) -> Self {
        Self {
            source,
            explanation: None,
            diagrams: Vec::new(),
        }
    }

    pub fn with_explanation(mut self, explanation: Option<&'a Explanation>) -> Self {
        self.explanation = explanation;
        self
    }

    /// 追加一张图；`file_name` 为 None 时写入占位文本
    pub fn with_diagram(mut self, title: &'a str, file_name: Option<&'a str>) -> Self {
        self.diagrams.push(DiagramSection { title, file_name });
        self
    }

    /// 生成 Markdown 文本
    pub fn render(&self) -> String {
        let mut out = format!("# {}\n\n## Extracted VBA Code\n\n", DOCUMENT_TITLE);

        if self.source.has_code() {
            let text = self.source.as_str();
            let fence = "`".repeat(longest_backtick_run(text).max(2) + 1);
            out.push_str(&fence);
            out.push_str("vba\n");
            out.push_str(text);
            if !text.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&fence);
            out.push('\n');
        } else {
            out.push_str(NO_CODE_FOUND);
            out.push('\n');
        }

        if let Some(explanation) = self.explanation {
            out.push_str("\n## Explanation\n\n");
            out.push_str(explanation.summary.trim_end());
            out.push('\n');

            if let Some(steps) = &explanation.steps {
                out.push_str("\n## Step-by-step Flow\n\n");
                out.push_str(steps.trim_end());
                out.push('\n');
            }
        }

        for diagram in &self.diagrams {
            out.push_str(&format!("\n## {}\n\n", diagram.title));
            match diagram.file_name {
                Some(file) => out.push_str(&format!("![{}]({})\n", diagram.title, file)),
                None => {
                    out.push_str(DIAGRAM_UNAVAILABLE);
                    out.push('\n');
                }
            }
        }

        out
    }

    /// 写入文档，父目录必须已存在
    pub fn write_to(&self, path: &Path) -> Result<PathBuf, ArtifactWriteError> {
        std::fs::write(path, self.render()).map_err(|e| ArtifactWriteError::new(path, e))?;
        info!("Wrote {}", path.display());
        Ok(path.to_path_buf())
    }
}

fn longest_backtick_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if c == '`' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::MacroFragment;

    fn source(code: &str) -> LogicalSource {
        LogicalSource::assemble(&[MacroFragment::new("Module1.bas", code)], false)
    }

    #[test]
    fn test_render_with_code() {
        let src = source("Sub A()\n  B(1)\nEnd Sub");
        let doc = DocumentAssembler::new(&src).render();
        assert!(doc.starts_with("# VBA Macro Documentation\n\n## Extracted VBA Code\n\n```vba\n"));
        assert!(doc.contains("Sub A()\n  B(1)\nEnd Sub\n```\n"));
        assert!(!doc.contains("## Explanation"));
    }

    #[test]
    fn test_render_without_code() {
        let src = LogicalSource::default();
        let doc = DocumentAssembler::new(&src).render();
        assert!(doc.contains(NO_CODE_FOUND));
        assert!(!doc.contains("```"));
    }

    #[test]
    fn test_fence_longer_than_backtick_runs() {
        let src = source("' ````quoted````\nSub A()\nEnd Sub\n");
        let doc = DocumentAssembler::new(&src).render();
        assert!(doc.contains("`````vba\n"));
        assert_eq!(longest_backtick_run("a ``` b `` c"), 3);
        assert_eq!(longest_backtick_run("none"), 0);
    }

    #[test]
    fn test_explanation_sections() {
        let src = source("Sub A()\nEnd Sub\n");
        let explanation = Explanation {
            summary: "Does A.".to_string(),
            steps: Some("1. Run A\n2. Stop\n".to_string()),
        };
        let doc = DocumentAssembler::new(&src)
            .with_explanation(Some(&explanation))
            .render();
        assert!(doc.contains("\n## Explanation\n\nDoes A.\n"));
        assert!(doc.contains("\n## Step-by-step Flow\n\n1. Run A\n2. Stop\n"));
    }

    #[test]
    fn test_unavailable_explanation_has_no_steps_section() {
        let src = source("Sub A()\nEnd Sub\n");
        let explanation = Explanation::unavailable();
        let doc = DocumentAssembler::new(&src)
            .with_explanation(Some(&explanation))
            .render();
        assert!(doc.contains(crate::explainer::EXPLANATION_UNAVAILABLE));
        assert!(!doc.contains("Step-by-step Flow"));
    }

    #[test]
    fn test_diagram_sections() {
        let src = source("Sub A()\nEnd Sub\n");
        let doc = DocumentAssembler::new(&src)
            .with_diagram("Call Graph", Some("call_graph.png"))
            .with_diagram("Step Diagram", None)
            .render();
        assert!(doc.contains("## Call Graph\n\n![Call Graph](call_graph.png)\n"));
        assert!(doc.contains("## Step Diagram\n\nDiagram unavailable.\n"));
    }

    #[test]
    fn test_write_to_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("documentation.md");
        let src = LogicalSource::default();
        let err = DocumentAssembler::new(&src).write_to(&path).unwrap_err();
        assert_eq!(err.path, path);
    }

    #[test]
    fn test_write_to() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("documentation.md");
        let src = source("Sub A()\nEnd Sub\n");
        DocumentAssembler::new(&src).write_to(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("Sub A()"));
    }
}
