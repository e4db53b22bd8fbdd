use serde::{Deserialize, Serialize};

/// 宏源码片段 - 容器内一个承载源码的条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroFragment {
    /// 来源名称: 条目路径或模块名
    pub origin_name: String,
    /// 源码文本，保持原始换行
    pub content: String,
}

impl MacroFragment {
    pub fn new(origin_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            origin_name: origin_name.into(),
            content: content.into(),
        }
    }
}

/// 逻辑源码 - 所有片段按发现顺序拼接的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogicalSource {
    text: String,
    origins: Vec<String>,
    has_code: bool,
}

impl LogicalSource {
    /// 按顺序拼接片段
    ///
    /// 片段内容原样保留；片段之间若缺少换行则补一个，避免相邻片段的行粘连。
    /// `with_markers` 为真时在每个片段前写入 `Filename: X` 标记行。
    pub fn assemble(fragments: &[MacroFragment], with_markers: bool) -> Self {
        let mut text = String::new();
        let mut origins = Vec::with_capacity(fragments.len());

        for (i, fragment) in fragments.iter().enumerate() {
            if with_markers {
                text.push_str("Filename: ");
                text.push_str(&fragment.origin_name);
                text.push('\n');
            }
            text.push_str(&fragment.content);

            let is_last = i + 1 == fragments.len();
            if !is_last && !fragment.content.is_empty() && !fragment.content.ends_with('\n') {
                text.push('\n');
            }
            origins.push(fragment.origin_name.clone());
        }

        let has_code = fragments.iter().any(|f| !f.content.trim().is_empty());

        Self {
            text,
            origins,
            has_code,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// 片段来源，按发现顺序
    pub fn origins(&self) -> &[String] {
        &self.origins
    }

    /// 是否至少有一个片段带有非空白源码
    pub fn has_code(&self) -> bool {
        self.has_code
    }

    /// 内容哈希 (SHA256 前16位)
    pub fn content_hash(&self) -> String {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(self.text.as_bytes());
        digest[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }
}
