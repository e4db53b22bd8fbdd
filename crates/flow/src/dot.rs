use crate::graph::{FlowGraph, StepGraph};
use dot_generator::{attr, id, node_id};
use dot_structures::{Attribute, Edge, EdgeTy, Graph, GraphAttributes, Id, Node, NodeId, Stmt, Vertex};
use graphviz_rust::printer::{DotPrinter, PrinterContext};
use std::collections::HashMap;

/// Graphviz 图结构生成器
///
/// 节点 id 由生成器分配，名字只出现在 label 中，
/// 因此任何过程名 (含引号、空格) 都能安全输出。
pub struct DotGenerator;

impl DotGenerator {
    /// 调用图：过程为实线框，未声明的调用目标为虚线节点，不指定布局方向
    pub fn call_graph(graph: &FlowGraph) -> Graph {
        let mut stmts = vec![Stmt::GAttribute(GraphAttributes::Node(vec![attr!("shape", "box")]))];

        for (i, procedure) in graph.procedures.iter().enumerate() {
            stmts.push(Self::node(node_id!(format!("p{}", i)), &procedure.name, vec![]));
        }

        let mut external: HashMap<&str, usize> = HashMap::new();
        for (i, symbol) in graph.dangling_symbols().into_iter().enumerate() {
            stmts.push(Self::node(
                node_id!(format!("x{}", i)),
                symbol,
                vec![attr!("style", "dashed")],
            ));
            external.insert(symbol, i);
        }

        for edge in &graph.edges {
            let target = match graph.resolve(&edge.to_symbol) {
                Some(index) => format!("p{}", index),
                None => match external.get(edge.to_symbol.as_str()) {
                    Some(index) => format!("x{}", index),
                    None => continue,
                },
            };
            stmts.push(Self::edge(node_id!(format!("p{}", edge.caller)), node_id!(target)));
        }

        Graph::DiGraph {
            id: Self::escaped("VBA Macro Flow"),
            strict: false,
            stmts,
        }
    }

    /// 步骤图：自上而下排列
    pub fn steps(graph: &StepGraph) -> Graph {
        let mut stmts = vec![
            Stmt::Attribute(attr!("rankdir", "TB")),
            Stmt::GAttribute(GraphAttributes::Node(vec![attr!("shape", "box")])),
        ];

        for step in &graph.steps {
            stmts.push(Self::node(Self::step_id(step.number), &step.text, vec![]));
        }

        for (from, to) in &graph.edges {
            stmts.push(Self::edge(Self::step_id(*from), Self::step_id(*to)));
        }

        Graph::DiGraph {
            id: Self::escaped("Steps"),
            strict: false,
            stmts,
        }
    }

    /// DOT 文本
    pub fn to_text(graph: &Graph) -> String {
        graph.print(&mut PrinterContext::default())
    }

    fn node(id: NodeId, label: &str, mut attributes: Vec<Attribute>) -> Stmt {
        attributes.insert(0, Attribute(id!("label"), Self::escaped(label)));
        Stmt::Node(Node { id, attributes })
    }

    fn edge(from: NodeId, to: NodeId) -> Stmt {
        Stmt::Edge(Edge {
            ty: EdgeTy::Pair(Vertex::N(from), Vertex::N(to)),
            attributes: vec![],
        })
    }

    fn step_id(number: usize) -> NodeId {
        NodeId(Self::escaped(&format!("Step {}", number)), None)
    }

    /// 带引号的 DOT 字符串 id
    pub(crate) fn escaped(text: &str) -> Id {
        let mut out = String::with_capacity(text.len() + 2);
        out.push('"');
        for c in text.chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => {}
                _ => out.push(c),
            }
        }
        out.push('"');
        Id::Escaped(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::SymbolScanner;

    fn stmts(graph: &Graph) -> &[Stmt] {
        match graph {
            Graph::DiGraph { stmts, .. } | Graph::Graph { stmts, .. } => stmts,
        }
    }

    fn nodes(graph: &Graph) -> Vec<&Node> {
        stmts(graph)
            .iter()
            .filter_map(|s| match s {
                Stmt::Node(node) => Some(node),
                _ => None,
            })
            .collect()
    }

    fn edges(graph: &Graph) -> Vec<(NodeId, NodeId)> {
        stmts(graph)
            .iter()
            .filter_map(|s| match s {
                Stmt::Edge(Edge { ty: EdgeTy::Pair(Vertex::N(a), Vertex::N(b)), .. }) => {
                    Some((a.clone(), b.clone()))
                }
                _ => None,
            })
            .collect()
    }

    fn label(node: &Node) -> Option<&Id> {
        node.attributes
            .iter()
            .find(|a| a.0 == id!("label"))
            .map(|a| &a.1)
    }

    #[test]
    fn test_escaped_specials() {
        assert_eq!(DotGenerator::escaped("plain"), Id::Escaped("\"plain\"".to_string()));
        assert_eq!(
            DotGenerator::escaped("say \"hi\""),
            Id::Escaped("\"say \\\"hi\\\"\"".to_string())
        );
        assert_eq!(DotGenerator::escaped("a\\b"), Id::Escaped("\"a\\\\b\"".to_string()));
        assert_eq!(
            DotGenerator::escaped("two\r\nlines"),
            Id::Escaped("\"two\\nlines\"".to_string())
        );
    }

    #[test]
    fn test_call_graph_nodes_and_edges() {
        let graph = SymbolScanner::default().scan("Sub A()\n  B(1)\nEnd Sub\nSub B(x)\nEnd Sub");
        let dot = DotGenerator::call_graph(&graph);

        let nodes = nodes(&dot);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, node_id!("p0"));
        assert_eq!(label(nodes[0]), Some(&DotGenerator::escaped("A")));
        assert_eq!(label(nodes[1]), Some(&DotGenerator::escaped("B")));
        assert_eq!(edges(&dot), vec![(node_id!("p0"), node_id!("p1"))]);
        assert!(!stmts(&dot).iter().any(|s| matches!(s, Stmt::Attribute(_))));
    }

    #[test]
    fn test_dangling_symbol_gets_one_dashed_node() {
        let graph = SymbolScanner::default()
            .scan("Sub A()\n  MsgBox(1)\n  MsgBox(2)\nEnd Sub");
        let dot = DotGenerator::call_graph(&graph);

        let external: Vec<_> = nodes(&dot)
            .into_iter()
            .filter(|n| n.attributes.contains(&attr!("style", "dashed")))
            .collect();
        assert_eq!(external.len(), 1);
        assert_eq!(external[0].id, node_id!("x0"));
        assert_eq!(label(external[0]), Some(&DotGenerator::escaped("MsgBox")));
        assert_eq!(
            edges(&dot),
            vec![(node_id!("p0"), node_id!("x0")), (node_id!("p0"), node_id!("x0"))]
        );
    }

    #[test]
    fn test_duplicate_procedures_resolve_to_first() {
        let graph = SymbolScanner::default()
            .scan("Sub A()\nEnd Sub\nSub A()\nEnd Sub\nSub C()\n  A(1)\nEnd Sub");
        let dot = DotGenerator::call_graph(&graph);
        let nodes = nodes(&dot);
        assert_eq!(label(nodes[0]), label(nodes[1]));
        assert_eq!(edges(&dot), vec![(node_id!("p2"), node_id!("p0"))]);
    }

    #[test]
    fn test_steps_layout_top_to_bottom() {
        let steps = StepGraph::from_lines("Open \"Data\"\nCopy").sequential();
        let dot = DotGenerator::steps(&steps);

        assert!(stmts(&dot).contains(&Stmt::Attribute(attr!("rankdir", "TB"))));
        let nodes = nodes(&dot);
        assert_eq!(nodes[0].id, NodeId(DotGenerator::escaped("Step 1"), None));
        assert_eq!(label(nodes[0]), Some(&DotGenerator::escaped("Open \"Data\"")));
        assert_eq!(
            edges(&dot),
            vec![(
                NodeId(DotGenerator::escaped("Step 1"), None),
                NodeId(DotGenerator::escaped("Step 2"), None)
            )]
        );
    }

    #[test]
    fn test_steps_without_edges() {
        let dot = DotGenerator::steps(&StepGraph::from_lines("one\ntwo"));
        assert_eq!(nodes(&dot).len(), 2);
        assert!(edges(&dot).is_empty());
    }

    #[test]
    fn test_to_text_is_digraph() {
        let graph = SymbolScanner::default().scan("Sub A()\n  B(1)\nEnd Sub");
        let text = DotGenerator::to_text(&DotGenerator::call_graph(&graph));
        assert!(text.starts_with("digraph \"VBA Macro Flow\""));
        assert!(text.contains("p0"));
        assert!(text.contains("dashed"));
        assert!(text.contains("->"));
    }
}
