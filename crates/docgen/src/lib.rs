//! docgen - 文档生成
//!
//! 说明服务、Markdown 文档、按请求隔离的产物目录、分析历史、请求流程

mod artifacts;
mod assembler;
mod config;
mod explainer;
mod history;
mod pipeline;

pub use artifacts::{ArtifactStore, ARTIFACT_FILES, CALL_GRAPH_FILE, DOCUMENT_FILE, STEPS_FILE};
pub use assembler::{ArtifactWriteError, DocumentAssembler, DIAGRAM_UNAVAILABLE, DOCUMENT_TITLE, NO_CODE_FOUND};
pub use config::ExplainerConfig;
pub use explainer::{
    explain_source, Explainer, Explanation, OpenAiExplainer, ServiceError, EXPLANATION_UNAVAILABLE,
};
pub use history::{History, HistoryRecord};
pub use pipeline::{AnalysisReport, Pipeline, PipelineError};
