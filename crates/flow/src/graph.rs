use serde::Serialize;

/// 过程 - 一段 `Sub ... End Sub`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Procedure {
    pub name: String,
    /// 声明行行号 (从 1 开始)
    pub line: usize,
    /// 声明行与结束行之间的原始行
    pub body_lines: Vec<String>,
}

/// 调用边 - 过程体中某一行看起来像对 `to_symbol` 的调用
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallEdge {
    pub from_procedure: String,
    /// 调用方在 `procedures` 中的下标，同名过程各自独立
    pub caller: usize,
    /// 不校验是否为已声明的过程
    pub to_symbol: String,
    pub line: usize,
}

/// 调用图
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlowGraph {
    /// 按首次声明顺序
    pub procedures: Vec<Procedure>,
    /// 按过程顺序，过程内按出现顺序
    pub edges: Vec<CallEdge>,
}

impl FlowGraph {
    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    /// 某个过程发出的调用
    pub fn calls_from(&self, caller: usize) -> impl Iterator<Item = &CallEdge> {
        self.edges.iter().filter(move |e| e.caller == caller)
    }

    /// 符号对应的第一个同名过程
    pub fn resolve(&self, symbol: &str) -> Option<usize> {
        self.procedures.iter().position(|p| p.name == symbol)
    }

    /// 未声明的调用目标，去重后按首次出现顺序
    pub fn dangling_symbols(&self) -> Vec<&str> {
        let mut result: Vec<&str> = Vec::new();
        for edge in &self.edges {
            let symbol = edge.to_symbol.as_str();
            if self.resolve(symbol).is_none() && !result.contains(&symbol) {
                result.push(symbol);
            }
        }
        result
    }

    /// 结构指纹 (SHA256 前16位)，只看节点名与边，不含行号
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        for procedure in &self.procedures {
            hasher.update(b"P\0");
            hasher.update(procedure.name.as_bytes());
            hasher.update(b"\0");
        }
        for edge in &self.edges {
            hasher.update(b"E\0");
            hasher.update(edge.caller.to_le_bytes());
            hasher.update(edge.to_symbol.as_bytes());
            hasher.update(b"\0");
        }
        let digest = hasher.finalize();
        digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// 步骤节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    /// 从 1 开始，只对非空行编号
    pub number: usize,
    pub text: String,
}

impl Step {
    /// 节点标识 `Step N`
    pub fn id(&self) -> String {
        format!("Step {}", self.number)
    }
}

/// 步骤图 - 由外部给出的逐行说明构成
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepGraph {
    pub steps: Vec<Step>,
    /// (from, to) 步骤编号
    pub edges: Vec<(usize, usize)>,
}

impl StepGraph {
    /// 每个非空行一个节点，label 为该行原文，不推断任何边
    pub fn from_lines(text: &str) -> Self {
        let steps = text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| Step {
                number: i + 1,
                text: line.to_string(),
            })
            .collect();
        Self {
            steps,
            edges: Vec::new(),
        }
    }

    pub fn with_edge(mut self, from: usize, to: usize) -> Self {
        self.edges.push((from, to));
        self
    }

    /// 相邻步骤依次相连
    pub fn sequential(mut self) -> Self {
        self.edges = self
            .steps
            .windows(2)
            .map(|pair| (pair[0].number, pair[1].number))
            .collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
