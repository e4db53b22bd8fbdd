//! 宏源码发现策略

mod compiled_project;
mod plain_text;

pub use compiled_project::CompiledProjectSource;
pub use plain_text::PlainTextSource;

use crate::container::ContainerEntry;
use crate::error::Result;
use crate::types::MacroFragment;
use serde::{Deserialize, Serialize};

/// 宏源码来源 trait
pub trait MacroSource: Send + Sync {
    /// 策略名称，用于日志
    fn name(&self) -> &'static str;

    /// 是否处理该条目
    fn accepts(&self, entry: &ContainerEntry) -> bool;

    /// 每个容器是否只处理第一个匹配条目
    fn single_entry(&self) -> bool {
        false
    }

    /// 从条目字节中读出片段
    fn fragments(&self, entry: &ContainerEntry, bytes: &[u8]) -> Result<Vec<MacroFragment>>;
}

/// 发现策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// 按后缀识别的文本源码条目
    PlainText,
    /// 编译后的宏工程
    CompiledProject,
    /// 两者都用
    #[default]
    All,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "plain-text",
            Self::CompiledProject => "compiled-project",
            Self::All => "all",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "plain-text" | "plain" => Some(Self::PlainText),
            "compiled-project" | "compiled" => Some(Self::CompiledProject),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    /// 策略对应的来源列表
    pub fn sources(&self) -> Vec<Box<dyn MacroSource>> {
        match self {
            Self::PlainText => vec![Box::new(PlainTextSource)],
            Self::CompiledProject => vec![Box::new(CompiledProjectSource)],
            Self::All => vec![Box::new(CompiledProjectSource), Box::new(PlainTextSource)],
        }
    }
}
