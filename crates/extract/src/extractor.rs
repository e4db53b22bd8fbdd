use crate::container::{ContainerReader, UnpackedContainer};
use crate::error::{ExtractError, Result};
use crate::sources::{MacroSource, Strategy};
use crate::types::{LogicalSource, MacroFragment};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// 提取配置
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub strategy: Strategy,
    /// 每个片段前写入 `Filename: X`
    pub origin_markers: bool,
    /// 临时目录的父目录 (默认系统临时目录)
    pub scratch_root: Option<PathBuf>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::All,
            origin_markers: true,
            scratch_root: None,
        }
    }
}

/// 宏提取器
pub struct MacroExtractor {
    options: ExtractOptions,
    reader: ContainerReader,
    sources: Vec<Box<dyn MacroSource>>,
}

impl MacroExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        let mut reader = ContainerReader::new();
        if let Some(root) = &options.scratch_root {
            reader = reader.with_scratch_root(root);
        }
        let sources = options.strategy.sources();
        Self {
            options,
            reader,
            sources,
        }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// 发现全部片段，按条目顺序
    ///
    /// 临时目录在返回前删除，无论成功与否。
    pub fn discover(&self, bytes: &[u8]) -> Result<Vec<MacroFragment>> {
        let container = self.reader.unpack(bytes)?;
        let result = self.collect_fragments(&container);
        if let Err(e) = container.close() {
            warn!("Failed to remove scratch dir: {}", e);
        }
        result
    }

    /// 提取逻辑源码，失败时退化为空源码
    pub fn extract(&self, bytes: &[u8]) -> LogicalSource {
        match self.discover(bytes) {
            Ok(fragments) => {
                info!("Extracted {} macro fragments", fragments.len());
                LogicalSource::assemble(&fragments, self.options.origin_markers)
            }
            Err(e) => {
                warn!("Extraction failed, continuing with empty source: {}", e);
                LogicalSource::default()
            }
        }
    }

    fn collect_fragments(&self, container: &UnpackedContainer) -> Result<Vec<MacroFragment>> {
        let mut fragments = Vec::new();
        let mut consumed: HashSet<&'static str> = HashSet::new();

        for entry in container.entries() {
            let Some(source) = self.sources.iter().find(|s| s.accepts(entry)) else {
                continue;
            };
            if source.single_entry() && !consumed.insert(source.name()) {
                debug!("Ignoring additional {} entry {}", source.name(), entry.name);
                continue;
            }

            let bytes = container.read(entry)?;
            match source.fragments(entry, &bytes) {
                Ok(found) => {
                    debug!("{}: {} fragments from {}", source.name(), found.len(), entry.name);
                    fragments.extend(found);
                }
                Err(ExtractError::BinaryProjectParse(e)) => {
                    warn!("Skipping unreadable macro project {}: {}", entry.name, e);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(fragments)
    }
}

impl Default for MacroExtractor {
    fn default() -> Self {
        Self::new(ExtractOptions::default())
    }
}
