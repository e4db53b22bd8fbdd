use crate::ovba::OvbaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("container format error: {0}")]
    ContainerFormat(#[from] zip::result::ZipError),
    #[error("binary project parse error: {0}")]
    BinaryProjectParse(#[from] OvbaError),
    #[error("scratch area error: {0}")]
    Scratch(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;
