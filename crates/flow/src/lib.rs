//! flow - 宏调用图
//!
//! 逐行扫描过程与调用、生成 DOT/Mermaid 文本、调用 Graphviz 渲染

mod dot;
mod graph;
mod mermaid;
mod renderer;
mod scanner;

pub use dot::DotGenerator;
pub use graph::{CallEdge, FlowGraph, Procedure, Step, StepGraph};
pub use mermaid::MermaidGenerator;
pub use renderer::{FlowRenderer, RenderError, RendererConfig};
pub use scanner::{Dialect, ScanOptions, SymbolScanner};
