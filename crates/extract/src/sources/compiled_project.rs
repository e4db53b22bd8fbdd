use super::MacroSource;
use crate::container::ContainerEntry;
use crate::error::Result;
use crate::ovba::VbaProject;
use crate::types::MacroFragment;
use tracing::{debug, info};

const PROJECT_FILE_NAME: &str = "vbaProject.bin";

/// 编译工程策略: 解析 `vbaProject.bin` 中的模块源码
#[derive(Debug, Clone, Copy, Default)]
pub struct CompiledProjectSource;

impl MacroSource for CompiledProjectSource {
    fn name(&self) -> &'static str {
        "compiled-project"
    }

    fn accepts(&self, entry: &ContainerEntry) -> bool {
        entry.file_name().eq_ignore_ascii_case(PROJECT_FILE_NAME)
    }

    fn single_entry(&self) -> bool {
        true
    }

    fn fragments(&self, entry: &ContainerEntry, bytes: &[u8]) -> Result<Vec<MacroFragment>> {
        let mut project = VbaProject::open(bytes.to_vec())?;
        if !project.contains_macros() {
            debug!("{} holds no macro modules", entry.name);
            return Ok(Vec::new());
        }

        let modules = project.module_sources()?;
        info!(
            "Found {} modules in {} ({})",
            modules.len(),
            entry.name,
            project.name().unwrap_or_default()
        );

        Ok(modules
            .into_iter()
            .map(|m| {
                debug!("Module {} from stream {}", m.declared_name, m.stream_path);
                let origin = format!("{}.{}", m.declared_name, m.kind.extension());
                MacroFragment::new(origin, m.source)
            })
            .collect())
    }
}
