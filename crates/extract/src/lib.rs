//! extract - 宏源码提取
//!
//! 打开 zip 容器，发现宏源码片段，拼接成一份逻辑源码

mod container;
mod error;
mod extractor;
pub mod ovba;
mod sources;
mod types;

pub use container::{ContainerEntry, ContainerReader, UnpackedContainer};
pub use error::{ExtractError, Result};
pub use extractor::{ExtractOptions, MacroExtractor};
pub use sources::{CompiledProjectSource, MacroSource, PlainTextSource, Strategy};
pub use types::{LogicalSource, MacroFragment};
