//! 写入 / 读取配置

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::common::Result;
use crate::partition::{parse_date, FreshnessLimit, PartitionTemplate};

/// 默认 blob 大小：约每 GB 32 个文件
pub const DEFAULT_BLOB_SIZE: u64 = 32 * 1024 * 1024;

// ── WriterConfig ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// 数据集根路径
    pub dataset:            String,
    pub partition_template: PartitionTemplate,
    /// 写入的目标分区日期
    pub partition_date:     NaiveDate,
    /// 单个 blob 的最大序列化字节数（压缩前）
    pub blob_size:          u64,
    pub codec:              Codec,
    /// 行缓冲临时文件目录；None 时使用系统临时目录
    pub scratch_dir:        Option<PathBuf>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            dataset:            String::new(),
            partition_template: PartitionTemplate::default(),
            partition_date:     Utc::now().date_naive(),
            blob_size:          DEFAULT_BLOB_SIZE,
            codec:              Codec::default(),
            scratch_dir:        None,
        }
    }
}

impl WriterConfig {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self { dataset: dataset.into(), ..Self::default() }
    }

    pub fn with_blob_size(mut self, blob_size: u64) -> Self {
        self.blob_size = blob_size; self
    }
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec; self
    }
    /// 按名称选择编解码；未知名称在此处立即报错
    pub fn with_codec_name(mut self, name: &str) -> Result<Self> {
        self.codec = name.parse()?;
        Ok(self)
    }
    pub fn with_partition_template(mut self, template: PartitionTemplate) -> Self {
        self.partition_template = template; self
    }
    pub fn with_partition_date(mut self, date: NaiveDate) -> Self {
        self.partition_date = date; self
    }
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into()); self
    }
}

// ── ReadOptions ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadOptions {
    pub dataset:            String,
    #[serde(default)]
    pub partition_template: PartitionTemplate,
    pub start_date:         NaiveDate,
    pub end_date:           NaiveDate,
    #[serde(default)]
    pub freshness_limit:    Option<FreshnessLimit>,
    /// blob 扩展名无法识别时使用的编解码
    #[serde(default)]
    pub fallback_codec:     Codec,
}

impl ReadOptions {
    /// 单日读取
    pub fn new(dataset: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            dataset:            dataset.into(),
            partition_template: PartitionTemplate::default(),
            start_date:         date,
            end_date:           date,
            freshness_limit:    None,
            fallback_codec:     Codec::default(),
        }
    }

    pub fn with_dates(mut self, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        self.start_date = start_date;
        self.end_date   = end_date;
        self
    }
    /// 日期以 ISO 字符串给出
    pub fn with_date_strings(self, start_date: &str, end_date: &str) -> Result<Self> {
        Ok(self.with_dates(parse_date(start_date)?, parse_date(end_date)?))
    }
    pub fn with_partition_template(mut self, template: PartitionTemplate) -> Self {
        self.partition_template = template; self
    }
    pub fn with_freshness_limit(mut self, limit: FreshnessLimit) -> Self {
        self.freshness_limit = Some(limit); self
    }
    pub fn with_fallback_codec(mut self, codec: Codec) -> Self {
        self.fallback_codec = codec; self
    }
}
