//! # blob-storage-engine
//!
//! 按日期分区的 blob 存储：写入端把记录行缓冲后按大小切分、压缩并提交到
//! 可插拔的 [`store::BlobStore`]；读取端按日期区间（可带新鲜度回退）流出记录；
//! 另有一个内存二级索引，按字段值查找行号。
//!
//! ## 整体架构
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  写入                                                         │
//! │   Record ─► BlobWriter ──(行缓冲 / 轮转)──► Codec::encode     │
//! │                │                              │               │
//! │          WriterConfig                    BlobStore::commit    │
//! │        (dataset, template,          {dataset}/{分区}/{ulid}.ext │
//! │         blob_size, codec)                     │               │
//! ├───────────────────────────────────────────────┼──────────────┤
//! │  读取                                         ▼               │
//! │   ReadOptions ─► PartitionResolver ─► [Partition]             │
//! │                  (日期区间 + 新鲜度回退)       │               │
//! │                                      BlobReader::records      │
//! │                                   list → read → decode → 行   │
//! ├──────────────────────────────────────────────────────────────┤
//! │  索引                                                         │
//! │   Record × N ─► IndexBuilder ─► KeyCoercer ─► BTree<键, 行号> │
//! │                                     Index::search / range     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! 编解码：`jsonl`（不压缩）、`lzma`、`zstd`（默认）、`columnar`（列存 + LZ4）。

// ── 基础 ─────────────────────────────────────────────────────────────────────
pub mod common;
pub(crate) mod observability;
pub mod value;
pub mod codec;
pub mod store;

// ── 写入 / 读取 ──────────────────────────────────────────────────────────────
pub mod config;
pub mod partition;
pub mod writer;
pub mod reader;

// ── 索引 ─────────────────────────────────────────────────────────────────────
pub mod index;

pub use codec::Codec;
pub use common::{BlobError, Result, RowId};
pub use config::{ReadOptions, WriterConfig};
pub use index::{Index, IndexBuilder};
pub use partition::{FreshnessLimit, Partition, PartitionResolver, PartitionTemplate};
pub use reader::BlobReader;
pub use store::{BlobRef, BlobStore, MemoryBlobStore};
pub use value::{Record, Value, ValueType};
pub use writer::{BlobWriter, CommittedBlob, WriterStats};
