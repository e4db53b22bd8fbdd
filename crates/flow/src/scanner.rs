//! 逐行词法扫描
//!
//! 不做语法分析：声明、结束、调用都只按单行的形状判断。

use crate::graph::{CallEdge, FlowGraph, Procedure};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 识别哪些块为过程
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// 只识别 `Sub Name(...)` ... `End Sub`
    #[default]
    SubOnly,
    /// 另识别 Function / Property，允许 Public/Private/Friend/Static 前缀
    Extended,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubOnly => "sub-only",
            Self::Extended => "extended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sub-only" | "sub" => Some(Self::SubOnly),
            "extended" => Some(Self::Extended),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    pub dialect: Dialect,
}

const MODIFIERS: &[&str] = &["public", "private", "friend", "static"];
const PROPERTY_ACCESSORS: &[&str] = &["get", "let", "set"];

/// 块关键字
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Sub,
    Function,
    Property,
}

impl BlockKind {
    fn end_line(&self) -> &'static str {
        match self {
            Self::Sub => "end sub",
            Self::Function => "end function",
            Self::Property => "end property",
        }
    }
}

/// 过程与调用扫描器
#[derive(Debug, Clone, Default)]
pub struct SymbolScanner {
    options: ScanOptions,
}

impl SymbolScanner {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// 扫描源码生成调用图
    ///
    /// 过程内部再次出现的声明行当作普通正文行处理；
    /// 到结尾仍未结束的过程同样保留。
    pub fn scan(&self, source: &str) -> FlowGraph {
        let mut graph = FlowGraph::default();
        let mut open: Option<(usize, BlockKind)> = None;

        for (i, raw) in source.lines().enumerate() {
            let line_no = i + 1;
            let trimmed = raw.trim();

            if let Some((index, kind)) = open {
                if trimmed.eq_ignore_ascii_case(kind.end_line()) {
                    open = None;
                    continue;
                }

                let procedure = &mut graph.procedures[index];
                procedure.body_lines.push(raw.to_string());
                if let Some(symbol) = call_candidate(raw) {
                    graph.edges.push(CallEdge {
                        from_procedure: procedure.name.clone(),
                        caller: index,
                        to_symbol: symbol.to_string(),
                        line: line_no,
                    });
                }
                continue;
            }

            if let Some((name, kind)) = self.declaration(trimmed) {
                graph.procedures.push(Procedure {
                    name: name.to_string(),
                    line: line_no,
                    body_lines: Vec::new(),
                });
                open = Some((graph.procedures.len() - 1, kind));
            }
        }

        if let Some((index, _)) = open {
            debug!(
                "Procedure {} not terminated before end of source",
                graph.procedures[index].name
            );
        }

        graph
    }

    fn declaration<'a>(&self, trimmed: &'a str) -> Option<(&'a str, BlockKind)> {
        let mut tokens = trimmed.split_whitespace().peekable();

        if self.options.dialect == Dialect::Extended {
            while tokens
                .peek()
                .is_some_and(|t| MODIFIERS.iter().any(|m| t.eq_ignore_ascii_case(m)))
            {
                tokens.next();
            }
        }

        let keyword = tokens.next()?;
        let kind = if keyword.eq_ignore_ascii_case("sub") {
            BlockKind::Sub
        } else if self.options.dialect == Dialect::Extended && keyword.eq_ignore_ascii_case("function") {
            BlockKind::Function
        } else if self.options.dialect == Dialect::Extended && keyword.eq_ignore_ascii_case("property") {
            let accessor = tokens.next()?;
            if !PROPERTY_ACCESSORS.iter().any(|a| accessor.eq_ignore_ascii_case(a)) {
                return None;
            }
            BlockKind::Property
        } else {
            return None;
        };

        let name = tokens.next()?.split('(').next().unwrap_or_default();
        if name.is_empty() {
            None
        } else {
            Some((name, kind))
        }
    }
}

/// 同时含 `(` 与 `)` 的行：取第一个 `(` 之前的最后一个词
fn call_candidate(line: &str) -> Option<&str> {
    if !line.contains(')') {
        return None;
    }
    let (before, _) = line.split_once('(')?;
    before.split_whitespace().last()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> FlowGraph {
        SymbolScanner::default().scan(source)
    }

    fn extended(source: &str) -> FlowGraph {
        SymbolScanner::new(ScanOptions {
            dialect: Dialect::Extended,
        })
        .scan(source)
    }

    fn names(graph: &FlowGraph) -> Vec<&str> {
        graph.procedures.iter().map(|p| p.name.as_str()).collect()
    }

    fn targets(graph: &FlowGraph) -> Vec<(&str, &str)> {
        graph
            .edges
            .iter()
            .map(|e| (e.from_procedure.as_str(), e.to_symbol.as_str()))
            .collect()
    }

    #[test]
    fn test_two_procedures_one_edge() {
        let graph = scan("Sub A()\n  B(1)\nEnd Sub\nSub B(x)\nEnd Sub");
        assert_eq!(names(&graph), vec!["A", "B"]);
        assert_eq!(targets(&graph), vec![("A", "B")]);
        assert_eq!(graph.edges[0].line, 2);
        assert_eq!(graph.procedures[0].body_lines, vec!["  B(1)"]);
        assert!(graph.procedures[1].body_lines.is_empty());
    }

    #[test]
    fn test_dangling_call_target() {
        let graph = scan("Sub A()\n  MsgBox(\"hi\")\nEnd Sub");
        assert_eq!(names(&graph), vec!["A"]);
        assert_eq!(targets(&graph), vec![("A", "MsgBox")]);
        assert_eq!(graph.dangling_symbols(), vec!["MsgBox"]);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let graph = scan("sub Lower()\nend sub\nSUB Upper()\n  x = Calc (2)\nEND SUB\n");
        assert_eq!(names(&graph), vec!["Lower", "Upper"]);
        assert_eq!(targets(&graph), vec![("Upper", "Calc")]);
    }

    #[test]
    fn test_indented_declaration_and_crlf() {
        let graph = scan("   Sub Indented()\r\n    Go(1)\r\n   End Sub  \r\n");
        assert_eq!(names(&graph), vec!["Indented"]);
        assert_eq!(graph.procedures[0].body_lines, vec!["    Go(1)"]);
    }

    #[test]
    fn test_lines_outside_procedures_are_ignored() {
        let graph = scan("Option Explicit\nDim x(10)\nSub A()\nEnd Sub\nFoo(1)\n");
        assert_eq!(names(&graph), vec!["A"]);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_call_needs_both_parentheses() {
        let graph = scan("Sub A()\n  Foo(\n  Bar )\n  Baz(1)\nEnd Sub");
        assert_eq!(targets(&graph), vec![("A", "Baz")]);
    }

    #[test]
    fn test_paren_at_line_start_produces_no_edge() {
        let graph = scan("Sub A()\n(1)\n   (x + y)\nEnd Sub");
        assert!(graph.edges.is_empty());
        assert_eq!(graph.procedures[0].body_lines.len(), 2);
    }

    #[test]
    fn test_declaration_without_name_is_not_a_procedure() {
        let graph = scan("Sub\nSub (x)\nEnd Sub");
        assert!(graph.procedures.is_empty());
    }

    #[test]
    fn test_nested_declaration_is_body_line() {
        let graph = scan("Sub Outer()\nSub Inner()\n  Work(1)\nEnd Sub\nEnd Sub");
        assert_eq!(names(&graph), vec!["Outer"]);
        assert_eq!(targets(&graph), vec![("Outer", "Inner"), ("Outer", "Work")]);
    }

    #[test]
    fn test_unterminated_procedure_is_kept() {
        let graph = scan("Sub A()\n  B(1)\n");
        assert_eq!(names(&graph), vec!["A"]);
        assert_eq!(graph.edges.len(), 1);
    }

    #[test]
    fn test_duplicate_names_stay_distinct() {
        let graph = scan("Sub A()\n  X(1)\nEnd Sub\nSub A()\n  Y(1)\nEnd Sub");
        assert_eq!(names(&graph), vec!["A", "A"]);
        assert_eq!(graph.edges[0].caller, 0);
        assert_eq!(graph.edges[1].caller, 1);
    }

    #[test]
    fn test_end_sub_with_trailing_comment_does_not_close() {
        let graph = scan("Sub A()\nEnd Sub ' done\n  Later(1)\nEnd Sub");
        assert_eq!(graph.procedures[0].body_lines.len(), 2);
        assert_eq!(targets(&graph), vec![("A", "Later")]);
    }

    #[test]
    fn test_sub_only_ignores_functions_and_modifiers() {
        let source = "Private Sub Hidden()\nEnd Sub\nFunction F()\n  G(1)\nEnd Function\n";
        let graph = scan(source);
        assert!(graph.procedures.is_empty());
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn test_extended_dialect() {
        let source = "Private Sub Hidden()\n  F(1)\nEnd Sub\n\
                      Public Function F(x)\n  F = x\nEnd Function\n\
                      Property Get Total()\n  Total = Sum(1)\nEnd Property\n\
                      Private Declare Function Ext Lib \"k\" ()\n";
        let graph = extended(source);
        assert_eq!(names(&graph), vec!["Hidden", "F", "Total"]);
        assert_eq!(targets(&graph), vec![("Hidden", "F"), ("Total", "Sum")]);
    }

    #[test]
    fn test_extended_end_must_match_block_kind() {
        let graph = extended("Function F()\nEnd Sub\n  G(1)\nEnd Function");
        assert_eq!(graph.procedures[0].body_lines.len(), 2);
        assert_eq!(targets(&graph), vec![("F", "G")]);
    }

    #[test]
    fn test_empty_source() {
        assert!(scan("").is_empty());
        assert!(scan("\n\n   \n").is_empty());
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!(Dialect::from_str("Extended"), Some(Dialect::Extended));
        assert_eq!(Dialect::from_str("sub"), Some(Dialect::SubOnly));
        assert_eq!(Dialect::from_str("vb6"), None);
        assert_eq!(Dialect::default().as_str(), "sub-only");
    }
}
