//! `VBA/dir` 流记录解析 (只解释需要的记录)

use super::{OvbaError, Result};

const PROJECT_CODEPAGE: u16 = 0x0003;
const PROJECT_NAME: u16 = 0x0004;
const PROJECT_VERSION: u16 = 0x0009;
const MODULE_NAME: u16 = 0x0019;
const MODULE_STREAM_NAME: u16 = 0x001A;
const MODULE_TYPE_PROCEDURAL: u16 = 0x0021;
const MODULE_TYPE_DOCUMENT: u16 = 0x0022;
const MODULE_TERMINATOR: u16 = 0x002B;
const MODULE_TEXT_OFFSET: u16 = 0x0031;

/// PROJECTVERSION 的 size 字段固定为 4，实际数据为 6 字节
const PROJECT_VERSION_LEN: usize = 6;

/// 模块类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// 标准模块 (.bas)
    Procedural,
    /// 类、文档、窗体模块 (.cls)
    Document,
}

impl ModuleKind {
    /// 导出文件扩展名
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Procedural => "bas",
            Self::Document => "cls",
        }
    }
}

/// 模块记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    /// 原始字节，按代码页解码前
    pub name: Vec<u8>,
    pub stream_name: Vec<u8>,
    pub kind: ModuleKind,
    pub text_offset: Option<usize>,
}

/// 解压后的 dir 流
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirStream {
    pub codepage: Option<u16>,
    pub project_name: Option<Vec<u8>>,
    pub modules: Vec<ModuleRecord>,
}

impl DirStream {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut dir = DirStream::default();
        let mut current: Option<ModuleRecord> = None;
        let mut offset = 0usize;

        while offset < data.len() {
            let header = data
                .get(offset..offset + 6)
                .ok_or(OvbaError::Truncated("dir record header"))?;
            let id = u16::from_le_bytes([header[0], header[1]]);
            let declared = u32::from_le_bytes([header[2], header[3], header[4], header[5]]) as usize;
            offset += 6;

            let len = if id == PROJECT_VERSION {
                PROJECT_VERSION_LEN
            } else {
                declared
            };
            let body = data
                .get(offset..offset + len)
                .ok_or(OvbaError::BadRecordLength { id, len })?;
            offset += len;

            match id {
                PROJECT_CODEPAGE if body.len() >= 2 => {
                    dir.codepage = Some(u16::from_le_bytes([body[0], body[1]]));
                }
                PROJECT_NAME => dir.project_name = Some(body.to_vec()),
                MODULE_NAME => {
                    if let Some(module) = current.take() {
                        dir.modules.push(module);
                    }
                    current = Some(ModuleRecord {
                        name: body.to_vec(),
                        stream_name: Vec::new(),
                        kind: ModuleKind::Procedural,
                        text_offset: None,
                    });
                }
                MODULE_STREAM_NAME => {
                    if let Some(module) = current.as_mut() {
                        module.stream_name = body.to_vec();
                    }
                }
                MODULE_TYPE_PROCEDURAL | MODULE_TYPE_DOCUMENT => {
                    if let Some(module) = current.as_mut() {
                        module.kind = if id == MODULE_TYPE_DOCUMENT {
                            ModuleKind::Document
                        } else {
                            ModuleKind::Procedural
                        };
                    }
                }
                MODULE_TEXT_OFFSET if body.len() >= 4 => {
                    if let Some(module) = current.as_mut() {
                        let n = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
                        module.text_offset = Some(n as usize);
                    }
                }
                MODULE_TERMINATOR => {
                    if let Some(module) = current.take() {
                        dir.modules.push(module);
                    }
                }
                _ => {}
            }
        }

        if let Some(module) = current.take() {
            dir.modules.push(module);
        }

        for module in &mut dir.modules {
            if module.stream_name.is_empty() {
                module.stream_name = module.name.clone();
            }
        }

        Ok(dir)
    }
}

/// 追加一条 dir 记录 (测试夹具用)
#[doc(hidden)]
pub fn push_record(out: &mut Vec<u8>, id: u16, body: &[u8]) {
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
}
