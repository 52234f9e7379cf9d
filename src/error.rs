use std::num::ParseIntError;
use thiserror::Error;

/// Fatal errors surfaced to the caller of the extractor.
///
/// Per-packet reassembly outcomes are not errors; see
/// [`AssemblerResult`](crate::format::ts::AssemblerResult).
#[derive(Error, Debug)]
pub enum TsPesError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parser error: {0}")]
    Parser(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),
}

pub type Result<T> = std::result::Result<T, TsPesError>;
