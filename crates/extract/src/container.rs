//! 容器读取 - 把 zip 容器解包到每次请求独立的临时目录

use crate::error::{ExtractError, Result};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use zip::ZipArchive;

/// 容器条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerEntry {
    /// 在压缩包中的序号
    pub index: usize,
    /// 压缩包内的原始名称
    pub name: String,
    /// 相对临时目录的路径
    pub path: PathBuf,
    pub size: u64,
}

impl ContainerEntry {
    /// 最后一段文件名
    pub fn file_name(&self) -> &str {
        self.name.rsplit(['/', '\\']).next().unwrap_or(&self.name)
    }

    /// 小写扩展名
    pub fn extension(&self) -> Option<String> {
        let file_name = self.file_name();
        let (stem, ext) = file_name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// 已解包的容器
///
/// 临时目录在 [`UnpackedContainer::close`] 或 drop 时删除。
pub struct UnpackedContainer {
    scratch: TempDir,
    entries: Vec<ContainerEntry>,
}

impl UnpackedContainer {
    /// 条目列表，按压缩包中央目录顺序
    pub fn entries(&self) -> &[ContainerEntry] {
        &self.entries
    }

    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// 读取条目字节
    pub fn read(&self, entry: &ContainerEntry) -> Result<Vec<u8>> {
        Ok(fs::read(self.scratch.path().join(&entry.path))?)
    }

    /// 删除临时目录
    pub fn close(self) -> Result<()> {
        let path = self.scratch.path().to_path_buf();
        self.scratch.close()?;
        debug!("Removed scratch dir {}", path.display());
        Ok(())
    }
}

/// 容器读取器
#[derive(Debug, Clone, Default)]
pub struct ContainerReader {
    scratch_root: Option<PathBuf>,
}

impl ContainerReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 临时目录创建在指定目录下 (默认系统临时目录)
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// 解包容器
    ///
    /// 非法 zip 返回 [`ExtractError::ContainerFormat`]；中途失败时临时目录随 drop 删除。
    pub fn unpack(&self, bytes: &[u8]) -> Result<UnpackedContainer> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("vbadoc-scratch-");
        let scratch = match &self.scratch_root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }

            let name = file.name().to_string();
            let Some(relative) = file.enclosed_name().map(|p| p.to_path_buf()) else {
                warn!("Skipping entry with unsafe path: {}", name);
                continue;
            };
            if !seen.insert(relative.clone()) {
                warn!("Skipping duplicate entry: {}", name);
                continue;
            }

            let target = scratch.path().join(&relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            // 声明的解压大小不可信，按实际数据流式写入
            let mut out = File::create(&target)?;
            let size = io::copy(&mut file, &mut out)
                .map_err(|e| ExtractError::ContainerFormat(e.into()))?;

            entries.push(ContainerEntry {
                index,
                name,
                path: relative,
                size,
            });
        }

        debug!(
            "Unpacked {} entries into {}",
            entries.len(),
            scratch.path().display()
        );

        Ok(UnpackedContainer { scratch, entries })
    }
}
