//! 扫描与渲染集成测试
//!
//! 依赖 Graphviz 的用例标记为 ignore，需要时用 `cargo test -- --ignored` 运行

use flow::{DotGenerator, FlowRenderer, FlowGraph, RendererConfig, StepGraph, SymbolScanner};

const WORKBOOK_MACROS: &str = "\
Filename: Module1.bas
Attribute VB_Name = \"Module1\"
Option Explicit

Sub Main()
    Dim total As Long
    total = Compute(10)
    Report total
    MsgBox (\"done\")
End Sub

Sub Compute(n)
    Compute = Helper(n) * 2
End Sub

Sub Helper(n)
    Helper = n + 1
End Sub
Filename: Sheet1.cls
Sub Worksheet_Change(ByVal Target As Range)
    If Not Intersect(Target, Range(\"A1\")) Is Nothing Then Main
End Sub
";

#[test]
fn test_scan_realistic_source() {
    let graph = SymbolScanner::default().scan(WORKBOOK_MACROS);

    let names: Vec<_> = graph.procedures.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Main", "Compute", "Helper", "Worksheet_Change"]);

    let edges: Vec<_> = graph
        .edges
        .iter()
        .map(|e| (e.from_procedure.as_str(), e.to_symbol.as_str()))
        .collect();
    // `Report total` 没有括号，不算调用；一行只取第一个 `(` 之前的词
    assert_eq!(
        edges,
        vec![
            ("Main", "Compute"),
            ("Main", "MsgBox"),
            ("Compute", "Helper"),
            ("Worksheet_Change", "Intersect"),
        ]
    );
    assert_eq!(graph.dangling_symbols(), vec!["MsgBox", "Intersect"]);
}

#[test]
fn test_node_count_matches_declarations() {
    for n in [0usize, 1, 5, 40] {
        let source: String = (0..n)
            .map(|i| format!("Sub P{}()\n  P{}(1)\nEnd Sub\n", i, i + 1))
            .collect();
        let graph = SymbolScanner::default().scan(&source);
        assert_eq!(graph.procedures.len(), n);
        assert_eq!(graph.edges.len(), n);
        if n > 0 {
            assert_eq!(graph.dangling_symbols(), vec![format!("P{}", n).as_str()]);
        }
    }
}

#[test]
fn test_scan_is_deterministic() {
    let a = SymbolScanner::default().scan(WORKBOOK_MACROS);
    let b = SymbolScanner::default().scan(WORKBOOK_MACROS);
    assert_eq!(a, b);
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_eq!(
        DotGenerator::to_text(&DotGenerator::call_graph(&a)),
        DotGenerator::to_text(&DotGenerator::call_graph(&b))
    );
}

#[test]
fn test_graph_serializes() {
    let graph = SymbolScanner::default().scan("Sub A()\n  B(1)\nEnd Sub");
    let json = serde_json::to_value(&graph).unwrap();
    assert_eq!(json["procedures"][0]["name"], "A");
    assert_eq!(json["edges"][0]["to_symbol"], "B");
    assert_eq!(json["edges"][0]["line"], 2);
}

#[tokio::test]
#[ignore = "requires Graphviz dot on PATH"]
async fn test_render_png_with_graphviz() {
    let dir = tempfile::tempdir().unwrap();
    let renderer = FlowRenderer::new(RendererConfig::default());

    let graph = SymbolScanner::default().scan(WORKBOOK_MACROS);
    let call_graph = renderer
        .render_call_graph(&graph, &dir.path().join("call_graph.png"))
        .await
        .unwrap()
        .unwrap();
    let bytes = std::fs::read(&call_graph).unwrap();
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");

    let steps = StepGraph::from_lines("Open the file\nRun Main\nShow result").sequential();
    let steps_png = renderer
        .render_steps(&steps, &dir.path().join("steps.png"))
        .await
        .unwrap()
        .unwrap();
    assert!(steps_png.exists());

    let leftovers = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "dot"))
        .count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_render_empty_graph_produces_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("call_graph.png");
    let rendered = FlowRenderer::default()
        .render_call_graph(&FlowGraph::default(), &out)
        .await
        .unwrap();
    assert!(rendered.is_none());
    assert!(!out.exists());
}
