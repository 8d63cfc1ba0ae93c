//! 全局基础类型与错误定义

use thiserror::Error;

// ── ID 类型别名 ───────────────────────────────────────────────────────────────

/// 数据集内的行序号（由调用方枚举给出）
pub type RowId = u64;

/// 分区标识：`{dataset}/{展开后的模板}`
pub type PartitionId = String;

// ── 保留标记 ──────────────────────────────────────────────────────────────────

/// 存储端把提交改投到失败区时，blob 名称中会出现的标记
pub const BACKOUT_MARKER: &str = "BACKOUT";

/// 系统 / 元数据 blob 的名称标记，读取时跳过
pub const SYSTEM_BLOB_MARKER: &str = "/_SYS.";

// ── 错误 ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("attributes of type `{type_name}` are not supported - the value was `{value}`")]
    UnsupportedType { value: String, type_name: String },
    #[error("record serialization failed: {0}")]
    Serialization(String),
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error("data not found: {0}")]
    DataNotFound(String),
    #[error("blob store failure: {0}")]
    Backend(String),
    #[error("invalid codec `{0}`, valid options are {valid:?}", valid = crate::codec::SUPPORTED_CODECS)]
    UnknownCodec(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("invalid partition template: {0}")]
    InvalidTemplate(String),
    #[error("invalid freshness limit: {0}")]
    InvalidFreshness(String),
    #[error("scratch buffer I/O error: {0}")]
    ScratchIo(#[from] std::io::Error),
}

impl BlobError {
    pub fn unsupported(value: impl std::fmt::Display, type_name: impl Into<String>) -> Self {
        Self::UnsupportedType { value: value.to_string(), type_name: type_name.into() }
    }
}

pub type Result<T> = std::result::Result<T, BlobError>;
