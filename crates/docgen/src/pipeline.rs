//! 单次请求的完整流程
//!
//! 提取 → 扫描 → 渲染调用图 → (说明 → 渲染步骤图) → 写文档。
//! 除文档写入外，每一步失败都退化为空结果或占位文本。

use crate::artifacts::{ArtifactStore, CALL_GRAPH_FILE, DOCUMENT_FILE, STEPS_FILE};
use crate::assembler::{ArtifactWriteError, DocumentAssembler};
use crate::explainer::{explain_source, Explainer, Explanation};
use crate::history::HistoryRecord;
use extract::{LogicalSource, MacroExtractor};
use flow::{FlowGraph, FlowRenderer, StepGraph, SymbolScanner};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    ArtifactWrite(#[from] ArtifactWriteError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// 一次分析的结果
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub request_id: Uuid,
    pub file_name: String,
    pub source: LogicalSource,
    pub graph: FlowGraph,
    pub explanation: Option<Explanation>,
    pub document: PathBuf,
    pub call_graph_diagram: Option<PathBuf>,
    pub steps_diagram: Option<PathBuf>,
    pub no_code_found: bool,
}

impl AnalysisReport {
    /// 对应的历史记录
    pub fn history_record(&self) -> HistoryRecord {
        HistoryRecord {
            request_id: self.request_id.to_string(),
            file_name: self.file_name.clone(),
            source_hash: self.source.content_hash(),
            procedure_count: self.graph.procedures.len() as i64,
            edge_count: self.graph.edges.len() as i64,
            code_found: !self.no_code_found,
            created_at: None,
        }
    }
}

/// 分析流程
pub struct Pipeline {
    extractor: MacroExtractor,
    scanner: SymbolScanner,
    renderer: FlowRenderer,
    explainer: Option<Box<dyn Explainer>>,
    store: ArtifactStore,
}

impl Pipeline {
    pub fn new(
        extractor: MacroExtractor,
        scanner: SymbolScanner,
        renderer: FlowRenderer,
        store: ArtifactStore,
    ) -> Self {
        Self {
            extractor,
            scanner,
            renderer,
            explainer: None,
            store,
        }
    }

    pub fn with_explainer(mut self, explainer: Option<Box<dyn Explainer>>) -> Self {
        self.explainer = explainer;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn has_explainer(&self) -> bool {
        self.explainer.is_some()
    }

    /// 分析一个上传的容器文件
    pub async fn analyze(&self, file_name: &str, bytes: &[u8]) -> Result<AnalysisReport> {
        self.store.collect_garbage();

        let request_id = Uuid::new_v4();
        let dir = self.store.create(request_id)?;
        info!("Analyzing {} as request {}", file_name, request_id);

        let source = self.extractor.extract(bytes);
        let graph = self.scanner.scan(source.as_str());
        let no_code_found = !source.has_code();
        info!(
            "{} procedures, {} call edges",
            graph.procedures.len(),
            graph.edges.len()
        );

        let call_graph_diagram = self.render_call_graph(&graph, &dir).await;

        let explanation = match (&self.explainer, no_code_found) {
            (Some(explainer), false) => Some(explain_source(&**explainer, source.as_str()).await),
            _ => None,
        };

        let steps_diagram = match explanation.as_ref().and_then(|e| e.steps.as_deref()) {
            Some(steps) => self.render_steps(steps, &dir).await,
            None => None,
        };

        let call_graph_name = call_graph_diagram.as_ref().map(|_| CALL_GRAPH_FILE);
        let steps_name = steps_diagram.as_ref().map(|_| STEPS_FILE);
        let mut assembler = DocumentAssembler::new(&source).with_explanation(explanation.as_ref());
        if !graph.is_empty() {
            assembler = assembler.with_diagram("Call Graph", call_graph_name);
        }
        if explanation.as_ref().is_some_and(|e| e.steps.is_some()) {
            assembler = assembler.with_diagram("Step Diagram", steps_name);
        }
        let document = assembler.write_to(&dir.join(DOCUMENT_FILE))?;

        Ok(AnalysisReport {
            request_id,
            file_name: file_name.to_string(),
            source,
            graph,
            explanation,
            document,
            call_graph_diagram,
            steps_diagram,
            no_code_found,
        })
    }

    async fn render_call_graph(&self, graph: &FlowGraph, dir: &Path) -> Option<PathBuf> {
        match self.renderer.render_call_graph(graph, &dir.join(CALL_GRAPH_FILE)).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Call graph diagram omitted: {}", e);
                None
            }
        }
    }

    async fn render_steps(&self, steps: &str, dir: &Path) -> Option<PathBuf> {
        let graph = StepGraph::from_lines(steps).sequential();
        match self.renderer.render_steps(&graph, &dir.join(STEPS_FILE)).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Step diagram omitted: {}", e);
                None
            }
        }
    }
}
