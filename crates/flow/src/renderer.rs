//! 外部 Graphviz 渲染
//!
//! 通过 graphviz-rust 调用 `dot`，中间 DOT 文件由它创建并在渲染结束后删除。

use crate::dot::DotGenerator;
use crate::graph::{FlowGraph, StepGraph};
use dot_structures::Graph;
use graphviz_rust::cmd::{CommandArg, Format};
use graphviz_rust::printer::PrinterContext;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("renderer disabled")]
    Disabled,
    #[error("Graphviz dot unavailable: {0}")]
    Unavailable(#[source] std::io::Error),
    #[error("Graphviz dot failed: {stderr}")]
    Failed { stderr: String },
    #[error("render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, RenderError>;

impl From<std::io::Error> for RenderError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            ErrorKind::NotFound => RenderError::Unavailable(e),
            _ => RenderError::Failed {
                stderr: e.to_string().trim().to_string(),
            },
        }
    }
}

/// 渲染配置
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// 关闭后不调用 Graphviz，渲染一律返回 [`RenderError::Disabled`]
    pub enabled: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl RendererConfig {
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    /// 从环境变量加载，`VBADOC_RENDER=off` 关闭渲染
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup("VBADOC_RENDER") {
            let value = value.trim().to_ascii_lowercase();
            if matches!(value.as_str(), "off" | "0" | "false" | "no") {
                config.enabled = false;
            }
        }
        config
    }
}

/// 图渲染器，输出 PNG
#[derive(Debug, Clone, Default)]
pub struct FlowRenderer {
    config: RendererConfig,
}

impl FlowRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// 渲染调用图，图为空时不调用渲染器，返回 None
    pub async fn render_call_graph(&self, graph: &FlowGraph, output: &Path) -> Result<Option<PathBuf>> {
        if graph.is_empty() {
            debug!("Call graph is empty, skipping render");
            return Ok(None);
        }
        self.render(DotGenerator::call_graph(graph), output).await.map(Some)
    }

    /// 渲染步骤图，无步骤时返回 None
    pub async fn render_steps(&self, steps: &StepGraph, output: &Path) -> Result<Option<PathBuf>> {
        if steps.is_empty() {
            debug!("Step graph is empty, skipping render");
            return Ok(None);
        }
        self.render(DotGenerator::steps(steps), output).await.map(Some)
    }

    /// 把图渲染为 PNG 写到 `output`
    pub async fn render(&self, graph: Graph, output: &Path) -> Result<PathBuf> {
        if !self.config.enabled {
            return Err(RenderError::Disabled);
        }

        let target = output.to_string_lossy().into_owned();
        tokio::task::spawn_blocking(move || {
            graphviz_rust::exec(
                graph,
                &mut PrinterContext::default(),
                vec![Format::Png.into(), CommandArg::Output(target)],
            )
        })
        .await??;

        info!("Rendered {}", output.display());
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::SymbolScanner;

    fn dot_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "dot"))
            .count()
    }

    #[test]
    fn test_config_from_lookup() {
        assert!(RendererConfig::default().enabled);
        assert!(RendererConfig::from_lookup(|_| None).enabled);
        assert!(!RendererConfig::from_lookup(|_| Some("off".to_string())).enabled);
        assert!(!RendererConfig::from_lookup(|_| Some(" FALSE ".to_string())).enabled);
        assert!(RendererConfig::from_lookup(|_| Some("on".to_string())).enabled);
    }

    #[test]
    fn test_io_error_mapping() {
        let missing = std::io::Error::new(ErrorKind::NotFound, "No such file or directory");
        assert!(matches!(RenderError::from(missing), RenderError::Unavailable(_)));

        let failed = std::io::Error::other("Error: syntax error in line 1\n");
        match RenderError::from(failed) {
            RenderError::Failed { stderr } => assert_eq!(stderr, "Error: syntax error in line 1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_graph_skips_renderer() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("call_graph.png");
        let rendered = FlowRenderer::default()
            .render_call_graph(&FlowGraph::default(), &out)
            .await
            .unwrap();
        assert!(rendered.is_none());
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_disabled_renderer_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("call_graph.png");
        let graph = SymbolScanner::default().scan("Sub A()\nEnd Sub");
        let err = FlowRenderer::new(RendererConfig::disabled())
            .render_call_graph(&graph, &out)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Disabled));
        assert!(!out.exists());
        assert_eq!(dot_files(dir.path()), 0);
    }

    #[tokio::test]
    #[ignore = "requires Graphviz dot on PATH"]
    async fn test_render_leaves_only_output() {
        let dir = tempfile::tempdir().unwrap();
        let graph = SymbolScanner::default().scan("Sub A()\n  B(1)\nEnd Sub");
        let out = FlowRenderer::default()
            .render_call_graph(&graph, &dir.path().join("call_graph.png"))
            .await
            .unwrap()
            .unwrap();
        assert!(std::fs::read(&out).unwrap().starts_with(b"\x89PNG"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
