//! 编译后宏工程 (`vbaProject.bin`) 解析
//!
//! OLE 复合文档中 `VBA/dir` 描述模块列表，每个模块流在 `TextOffset`
//! 之后是压缩过的源码。

mod compression;
mod dir;

pub use compression::{compress_container, decompress_container};
pub use dir::{push_record, DirStream, ModuleKind, ModuleRecord};

use encoding_rs::{
    Encoding, BIG5, EUC_KR, GBK, SHIFT_JIS, UTF_16LE, UTF_8, WINDOWS_1250, WINDOWS_1251,
    WINDOWS_1252, WINDOWS_1253, WINDOWS_1254, WINDOWS_1255, WINDOWS_1256, WINDOWS_1257,
    WINDOWS_1258, WINDOWS_874,
};
use std::io::{Cursor, Read};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OvbaError {
    #[error("compound file error: {0}")]
    CompoundFile(#[from] std::io::Error),
    #[error("missing stream {0}")]
    MissingStream(String),
    #[error("compressed container is empty")]
    EmptyContainer,
    #[error("invalid container signature {0:#04x}")]
    BadContainerSignature(u8),
    #[error("invalid chunk header {0:#06x}")]
    BadChunkHeader(u16),
    #[error("truncated {0}")]
    Truncated(&'static str),
    #[error("copy token offset {offset} exceeds {produced} decompressed bytes")]
    BadCopyToken { offset: usize, produced: usize },
    #[error("dir record {id:#06x} claims {len} bytes beyond end of stream")]
    BadRecordLength { id: u16, len: usize },
}

pub type Result<T> = std::result::Result<T, OvbaError>;

const DIR_STREAM: &str = "VBA/dir";

/// 模块源码
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    /// 复合文档内的流路径，如 `VBA/Module1`
    pub stream_path: String,
    /// dir 中声明的模块名
    pub declared_name: String,
    pub kind: ModuleKind,
    pub source: String,
}

/// 已打开的宏工程
pub struct VbaProject {
    file: cfb::CompoundFile<Cursor<Vec<u8>>>,
    dir: Option<DirStream>,
    encoding: &'static Encoding,
}

impl VbaProject {
    /// 打开复合文档并读取 dir 流
    ///
    /// 没有 `VBA/dir` 的工程视为不含宏，而不是错误。
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let mut file = cfb::CompoundFile::open(Cursor::new(bytes))?;

        let dir = if file.is_stream(DIR_STREAM) {
            let raw = read_stream(&mut file, DIR_STREAM)?;
            Some(DirStream::parse(&decompress_container(&raw)?)?)
        } else {
            None
        };

        let encoding = dir
            .as_ref()
            .and_then(|d| d.codepage)
            .map(encoding_for_codepage)
            .unwrap_or(WINDOWS_1252);

        Ok(Self {
            file,
            dir,
            encoding,
        })
    }

    /// 工程是否包含任何模块
    pub fn contains_macros(&self) -> bool {
        self.dir.as_ref().is_some_and(|d| !d.modules.is_empty())
    }

    pub fn name(&self) -> Option<String> {
        let raw = self.dir.as_ref()?.project_name.as_ref()?;
        Some(decode(raw, self.encoding))
    }

    /// 按 dir 顺序读出全部模块源码
    pub fn module_sources(&mut self) -> Result<Vec<ModuleSource>> {
        let Some(dir) = self.dir.clone() else {
            return Ok(Vec::new());
        };

        let mut sources = Vec::with_capacity(dir.modules.len());
        for module in &dir.modules {
            let stream_name = decode(&module.stream_name, self.encoding);
            let stream_path = format!("VBA/{}", stream_name);
            if !self.file.is_stream(&stream_path) {
                return Err(OvbaError::MissingStream(stream_path));
            }

            let raw = read_stream(&mut self.file, &stream_path)?;
            let start = module
                .text_offset
                .unwrap_or_else(|| guess_text_offset(&raw))
                .min(raw.len());
            let source_bytes = decompress_container(&raw[start..])?;

            sources.push(ModuleSource {
                stream_path,
                declared_name: decode(&module.name, self.encoding),
                kind: module.kind,
                source: decode_source(&source_bytes, self.encoding),
            });
        }

        Ok(sources)
    }
}

fn read_stream(file: &mut cfb::CompoundFile<Cursor<Vec<u8>>>, path: &str) -> Result<Vec<u8>> {
    let mut stream = file.open_stream(path)?;
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf)?;
    Ok(buf)
}

/// dir 未给出 TextOffset 时，找第一个能完整解压的容器起点
fn guess_text_offset(stream: &[u8]) -> usize {
    (0..stream.len())
        .filter(|&i| stream[i] == 0x01)
        .find(|&i| decompress_container(&stream[i..]).is_ok())
        .unwrap_or(0)
}

fn decode(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _) = encoding.decode_without_bom_handling(bytes);
    text.into_owned()
}

/// 模块源码通常是代码页编码，少数生成器写入 UTF-16LE
fn decode_source(bytes: &[u8], encoding: &'static Encoding) -> String {
    if bytes.len() >= 2 && bytes.len() % 2 == 0 {
        let pairs = bytes.len() / 2;
        let zero_high = bytes.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();
        if zero_high * 2 >= pairs {
            return decode(bytes, UTF_16LE);
        }
    }
    decode(bytes, encoding)
}

fn encoding_for_codepage(codepage: u16) -> &'static Encoding {
    match codepage {
        874 => WINDOWS_874,
        932 => SHIFT_JIS,
        936 => GBK,
        949 => EUC_KR,
        950 => BIG5,
        1250 => WINDOWS_1250,
        1251 => WINDOWS_1251,
        1253 => WINDOWS_1253,
        1254 => WINDOWS_1254,
        1255 => WINDOWS_1255,
        1256 => WINDOWS_1256,
        1257 => WINDOWS_1257,
        1258 => WINDOWS_1258,
        65001 => UTF_8,
        _ => WINDOWS_1252,
    }
}

/// 构造内存中的 `vbaProject.bin` (测试夹具用)
#[doc(hidden)]
pub fn build_project(codepage: u16, modules: &[(&str, ModuleKind, &[u8])]) -> std::io::Result<Vec<u8>> {
    use std::io::Write;

    let mut dir = Vec::new();
    push_record(&mut dir, 0x0003, &codepage.to_le_bytes());
    push_record(&mut dir, 0x0004, b"VBAProject");
    for (name, kind, _) in modules {
        push_record(&mut dir, 0x0019, name.as_bytes());
        push_record(&mut dir, 0x001A, name.as_bytes());
        let type_id = match kind {
            ModuleKind::Procedural => 0x0021,
            ModuleKind::Document => 0x0022,
        };
        push_record(&mut dir, type_id, &[]);
        push_record(&mut dir, 0x0031, &0u32.to_le_bytes());
        push_record(&mut dir, 0x002B, &[]);
    }

    let mut file = cfb::CompoundFile::create(Cursor::new(Vec::new()))?;
    file.create_storage("VBA")?;
    file.create_stream("VBA/dir")?.write_all(&compress_container(&dir))?;
    for (name, _, source) in modules {
        file.create_stream(format!("VBA/{}", name))?
            .write_all(&compress_container(source))?;
    }
    Ok(file.into_inner().into_inner())
}
