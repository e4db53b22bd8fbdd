//! 按请求隔离的产物目录
//!
//! 每次分析在 `<root>/<request-id>/` 下写入产物，过期目录在下一次分析前回收。

use crate::assembler::ArtifactWriteError;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DOCUMENT_FILE: &str = "documentation.md";
pub const CALL_GRAPH_FILE: &str = "call_graph.png";
pub const STEPS_FILE: &str = "steps.png";

/// 允许下载的产物文件名
pub const ARTIFACT_FILES: &[&str] = &[DOCUMENT_FILE, CALL_GRAPH_FILE, STEPS_FILE];

const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// 产物存储
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    retention: Duration,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// 默认根目录 `<data-local-dir>/vbadoc/artifacts`
    pub fn default_root() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("vbadoc")
            .join("artifacts")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn request_dir(&self, request_id: Uuid) -> PathBuf {
        self.root.join(request_id.to_string())
    }

    /// 创建请求目录
    pub fn create(&self, request_id: Uuid) -> Result<PathBuf, ArtifactWriteError> {
        let dir = self.request_dir(request_id);
        std::fs::create_dir_all(&dir).map_err(|e| ArtifactWriteError::new(&dir, e))?;
        debug!("Created artifact dir {}", dir.display());
        Ok(dir)
    }

    /// 查找已存在的产物；只接受已知文件名
    pub fn locate(&self, request_id: Uuid, name: &str) -> Option<PathBuf> {
        if !ARTIFACT_FILES.contains(&name) {
            return None;
        }
        let path = self.request_dir(request_id).join(name);
        path.is_file().then_some(path)
    }

    /// 删除超过保留期的请求目录，返回删除数量
    ///
    /// 只处理名字是 UUID 的目录，根目录下的其他内容不动。
    pub fn collect_garbage(&self) -> usize {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!("Cannot list artifact root {}: {}", self.root.display(), e);
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let is_request = entry
                .file_name()
                .to_str()
                .is_some_and(|name| Uuid::parse_str(name).is_ok());
            if !is_request || !path.is_dir() {
                continue;
            }

            let expired = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > self.retention);
            if !expired {
                continue;
            }

            match std::fs::remove_dir_all(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove expired artifacts {}: {}", path.display(), e),
            }
        }

        if removed > 0 {
            info!("Removed {} expired artifact dirs", removed);
        }
        removed
    }
}
