use super::MacroSource;
use crate::container::ContainerEntry;
use crate::error::Result;
use crate::types::MacroFragment;
use encoding_rs::WINDOWS_1252;

/// 文本源码后缀
const SOURCE_EXTENSIONS: &[&str] = &["bas", "cls", "vb"];

/// 文本策略: 后缀为 `.bas` / `.cls` / `.vb` 的条目直接按文本读取
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextSource;

impl MacroSource for PlainTextSource {
    fn name(&self) -> &'static str {
        "plain-text"
    }

    fn accepts(&self, entry: &ContainerEntry) -> bool {
        entry
            .extension()
            .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext.as_str()))
    }

    fn fragments(&self, entry: &ContainerEntry, bytes: &[u8]) -> Result<Vec<MacroFragment>> {
        Ok(vec![MacroFragment::new(entry.name.clone(), decode_text(bytes))])
    }
}

/// UTF-8 (去掉 BOM) 优先，否则按 Windows-1252
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(_) => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}
