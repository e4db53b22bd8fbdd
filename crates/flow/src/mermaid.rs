use crate::graph::{FlowGraph, StepGraph};
use std::collections::HashSet;

/// Mermaid 图生成器
pub struct MermaidGenerator {
    max_nodes: usize,
}

impl MermaidGenerator {
    pub fn new() -> Self {
        Self { max_nodes: 100 }
    }

    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = max;
        self
    }

    /// 生成调用图 Mermaid 代码
    ///
    /// 入口过程 (无人调用) 用子程序框，叶子过程用圆角框，
    /// 未声明的调用目标用六边形。超过上限的过程按声明顺序截断。
    pub fn generate_call_graph(&self, graph: &FlowGraph) -> String {
        let mut lines = vec!["flowchart TD".to_string()];
        let included = graph.procedures.len().min(self.max_nodes);

        let called: HashSet<usize> = graph
            .edges
            .iter()
            .filter_map(|e| graph.resolve(&e.to_symbol))
            .collect();

        for (i, procedure) in graph.procedures.iter().take(included).enumerate() {
            let label = Self::label(&procedure.name);
            let line = if !called.contains(&i) {
                format!("    p{}[[{}]]", i, label)
            } else if graph.calls_from(i).next().is_none() {
                format!("    p{}([{}])", i, label)
            } else {
                format!("    p{}[{}]", i, label)
            };
            lines.push(line);
        }

        let mut external: Vec<&str> = Vec::new();
        for edge in graph.edges.iter().filter(|e| e.caller < included) {
            let target = match graph.resolve(&edge.to_symbol) {
                Some(index) if index < included => format!("p{}", index),
                Some(_) => continue,
                None => {
                    let position = match external.iter().position(|s| *s == edge.to_symbol) {
                        Some(position) => position,
                        None => {
                            external.push(&edge.to_symbol);
                            lines.push(format!(
                                "    x{}{{{{{}}}}}",
                                external.len() - 1,
                                Self::label(&edge.to_symbol)
                            ));
                            external.len() - 1
                        }
                    };
                    format!("x{}", position)
                }
            };
            lines.push(format!("    p{} --> {}", edge.caller, target));
        }

        lines.join("\n")
    }

    /// 生成步骤图 Mermaid 代码
    pub fn generate_steps(&self, graph: &StepGraph) -> String {
        let mut lines = vec!["flowchart TD".to_string()];
        for step in graph.steps.iter().take(self.max_nodes) {
            lines.push(format!("    s{}[{}]", step.number, Self::label(&step.text)));
        }
        for (from, to) in &graph.edges {
            if *from <= self.max_nodes && *to <= self.max_nodes {
                lines.push(format!("    s{} --> s{}", from, to));
            }
        }
        lines.join("\n")
    }

    /// 引号包裹的标签，内部引号转为实体
    #[doc(hidden)]
    pub fn label(text: &str) -> String {
        format!("\"{}\"", text.replace('"', "#quot;"))
    }
}

impl Default for MermaidGenerator {
    fn default() -> Self {
        Self::new()
    }
}
