//! BlobWriter：行缓冲 + 按大小轮转 + 提交
//!
//! ```text
//!  append(record)
//!     │ to_line()            ← 序列化失败直接返回，不改动缓冲
//!     ▼
//!  bytes + len > blob_size ? ──是──► commit()
//!     │                                 │
//!     ▼                                 ▼
//!  写入当前临时文件（无则新建）  读回 → Codec::encode → BlobStore::commit
//! ```
//!
//! 触发轮转的那条记录写入新缓冲，并计入新缓冲的字节数。
//! 提交只消费已有缓冲，新缓冲在下一次 `append` 时才创建，
//! 因此 `close()` 不依赖能否再分配临时文件。
//! 写入器被丢弃时不会隐式提交，调用方必须显式 `commit()` 或 `close()`。

use std::io::{BufWriter, Read, Seek, Write};
use std::sync::Arc;

use tempfile::NamedTempFile;
use ulid::{Generator, Ulid};

use crate::codec::Codec;
use crate::common::{PartitionId, Result, BACKOUT_MARKER};
use crate::config::WriterConfig;
use crate::observability::{log_debug, log_warn};
use crate::store::BlobStore;
use crate::value::Record;

/// 一次提交的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedBlob {
    /// 存储端分配的最终名称
    pub name:            String,
    pub record_count:    u64,
    /// 压缩前的序列化字节数
    pub raw_bytes:       u64,
    pub committed_bytes: u64,
    pub codec:           Codec,
    /// 数据被存储端改投到了 BACKOUT 区
    pub rerouted:        bool,
}

/// 写入器生命周期内的累计统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub blobs:           u64,
    pub records:         u64,
    pub raw_bytes:       u64,
    pub committed_bytes: u64,
    pub rerouted_blobs:  u64,
}

// ── 当前缓冲 ──────────────────────────────────────────────────────────────────

struct OpenBlob {
    file:    BufWriter<NamedTempFile>,
    records: u64,
    bytes:   u64,
}

impl OpenBlob {
    fn create(config: &WriterConfig) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("blob-").suffix(".jsonl");
        let file = match &config.scratch_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None      => builder.tempfile()?,
        };
        Ok(Self { file: BufWriter::new(file), records: 0, bytes: 0 })
    }

    /// 刷盘后读回整个行缓冲
    fn read_back(self) -> Result<(Vec<u8>, NamedTempFile)> {
        let mut scratch = self.file.into_inner().map_err(|e| e.into_error())?;
        scratch.rewind()?;
        let mut raw = Vec::with_capacity(self.bytes as usize);
        scratch.read_to_end(&mut raw)?;
        Ok((raw, scratch))
    }
}

fn discard_scratch(scratch: NamedTempFile) {
    let path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        log_debug!(
            component = "writer",
            event = "scratch_cleanup_failed",
            path = %path.display(),
            error = %e
        );
    }
}

// ── BlobWriter ────────────────────────────────────────────────────────────────

/// 单写者：`append` / `commit` 需要 `&mut self`，同一写入器同一时刻最多一个提交。
/// 跨线程共享时由调用方加锁。
pub struct BlobWriter {
    config:    WriterConfig,
    store:     Arc<dyn BlobStore>,
    partition: PartitionId,
    current:   Option<OpenBlob>,
    stats:     WriterStats,
    /// 同一毫秒内也单调递增，名称顺序即提交顺序
    ids:       Generator,
}

impl BlobWriter {
    pub fn new(config: WriterConfig, store: Arc<dyn BlobStore>) -> Result<Self> {
        let partition = config.partition_template
            .partition_id(&config.dataset, config.partition_date);
        let current = OpenBlob::create(&config)?;
        Ok(Self {
            config,
            store,
            partition,
            current: Some(current),
            stats:   WriterStats::default(),
            ids:     Generator::new(),
        })
    }

    /// 追加一条记录，返回它在当前 blob 中的序号（从 1 开始）
    pub fn append(&mut self, record: &Record) -> Result<u64> {
        let line = record.to_line()?;
        let size = line.len() as u64;

        if self.records_in_blob() > 0 && self.bytes_in_blob() + size > self.config.blob_size {
            self.commit()?;
        }

        let current = match self.current.take() {
            Some(blob) => blob,
            None       => OpenBlob::create(&self.config)?,
        };
        let current = self.current.insert(current);
        current.file.write_all(&line)?;
        current.bytes   += size;
        current.records += 1;
        Ok(current.records)
    }

    /// 提交当前缓冲；缓冲为空时什么也不做并返回 None。
    ///
    /// 失败时（编码或后端）缓冲中的记录被丢弃，错误原样返回，写入器继续可用。
    pub fn commit(&mut self) -> Result<Option<CommittedBlob>> {
        let blob = match self.current.take() {
            Some(blob) if blob.records > 0 => blob,
            empty => {
                self.current = empty;
                return Ok(None);
            }
        };

        let records = blob.records;
        let (raw, scratch) = blob.read_back()?;

        let outcome = self.ship(&raw, records);
        discard_scratch(scratch);
        let committed = outcome?;

        self.stats.blobs           += 1;
        self.stats.records         += committed.record_count;
        self.stats.raw_bytes       += committed.raw_bytes;
        self.stats.committed_bytes += committed.committed_bytes;
        if committed.rerouted {
            self.stats.rerouted_blobs += 1;
        }
        Ok(Some(committed))
    }

    /// 提交剩余记录并结束写入器
    pub fn close(mut self) -> Result<WriterStats> {
        self.commit()?;
        Ok(std::mem::take(&mut self.stats))
    }

    fn ship(&mut self, raw: &[u8], records: u64) -> Result<CommittedBlob> {
        let codec   = self.config.codec;
        let encoded = codec.encode(raw)?;
        // 随机部分溢出时退回非单调 id
        let id = self.ids.generate().unwrap_or_else(|_| Ulid::new());
        let preferred = format!("{}/{}{}", self.partition, id, codec.extension());
        let name = self.store.commit(&encoded, Some(&preferred))?;

        let rerouted = name.contains(BACKOUT_MARKER);
        if rerouted {
            log_warn!(
                component = "writer",
                event = "blob_rerouted",
                records = records,
                blob = %name,
                "failed records written to BACKOUT partition"
            );
        }
        log_debug!(
            component = "writer",
            event = "blob_committed",
            blob = %name,
            records = records,
            raw_bytes = raw.len(),
            committed_bytes = encoded.len(),
            codec = %codec
        );

        Ok(CommittedBlob {
            name,
            record_count:    records,
            raw_bytes:       raw.len() as u64,
            committed_bytes: encoded.len() as u64,
            codec,
            rerouted,
        })
    }

    // ── 辅助 ─────────────────────────────────────────────────────────────────

    pub fn records_in_blob(&self) -> u64 { self.current.as_ref().map_or(0, |b| b.records) }
    pub fn bytes_in_blob(&self)   -> u64 { self.current.as_ref().map_or(0, |b| b.bytes) }
    pub fn partition(&self)       -> &str { &self.partition }
    pub fn stats(&self)           -> &WriterStats { &self.stats }
}

impl Drop for BlobWriter {
    fn drop(&mut self) {
        let pending = self.records_in_blob();
        if pending > 0 {
            log_warn!(
                component = "writer",
                event = "writer_dropped_with_pending",
                partition = %self.partition,
                records = pending,
                "writer dropped without commit, buffered records discarded"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::BlobError;
    use crate::store::MemoryBlobStore;
    use chrono::NaiveDate;

    fn writer(blob_size: u64, store: Arc<MemoryBlobStore>) -> BlobWriter {
        let cfg = WriterConfig::new("data")
            .with_blob_size(blob_size)
            .with_codec(Codec::Jsonl)
            .with_partition_date(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        BlobWriter::new(cfg, store).unwrap()
    }

    #[test]
    fn append_returns_position_within_current_blob() {
        let store = Arc::new(MemoryBlobStore::new());
        let mut w = writer(1024 * 1024, store.clone());
        for i in 1..=3u64 {
            assert_eq!(w.append(&Record::new().with("i", i as i64)).unwrap(), i);
        }
        assert_eq!(w.partition(), "data/year_2021/month_01/day_01");
    }

    #[test]
    fn rotation_credits_trigger_record_to_new_blob() {
        let store = Arc::new(MemoryBlobStore::new());
        let record = Record::new().with("index", 300i64);
        let size = record.to_line().unwrap().len() as u64;
        // 恰好容纳两条
        let mut w = writer(size * 2, store.clone());

        assert_eq!(w.append(&record).unwrap(), 1);
        assert_eq!(w.append(&record).unwrap(), 2);
        assert_eq!(store.blob_count(), 0);

        assert_eq!(w.append(&record).unwrap(), 1);
        assert_eq!(store.blob_count(), 1);
        assert_eq!(w.bytes_in_blob(), size);
        assert_eq!(w.records_in_blob(), 1);
    }

    #[test]
    fn serialization_failure_leaves_buffer_untouched() {
        let store = Arc::new(MemoryBlobStore::new());
        let mut w = writer(1024, store.clone());
        w.append(&Record::new().with("ok", 1i64)).unwrap();
        let bytes = w.bytes_in_blob();

        let err = w.append(&Record::new().with("bad", f64::INFINITY)).unwrap_err();
        assert!(matches!(err, BlobError::Serialization(_)));
        assert_eq!(w.records_in_blob(), 1);
        assert_eq!(w.bytes_in_blob(), bytes);
    }

    #[test]
    fn second_commit_is_a_no_op() {
        let store = Arc::new(MemoryBlobStore::new());
        let mut w = writer(1024, store.clone());
        w.append(&Record::new().with("a", 1i64)).unwrap();
        assert!(w.commit().unwrap().is_some());
        assert!(w.commit().unwrap().is_none());
        assert_eq!(store.blob_count(), 1);
    }

    #[test]
    fn rerouted_commit_still_succeeds() {
        let store = Arc::new(MemoryBlobStore::new());
        store.set_reroute_to_backout(true);
        let mut w = writer(1024, store.clone());
        w.append(&Record::new().with("a", 1i64)).unwrap();
        let blob = w.commit().unwrap().unwrap();
        assert!(blob.rerouted);
        assert!(blob.name.contains(BACKOUT_MARKER));
        assert_eq!(w.close().unwrap().rerouted_blobs, 1);
    }

    #[test]
    fn backend_failure_propagates_and_writer_recovers() {
        let store = Arc::new(MemoryBlobStore::new());
        let mut w = writer(1024, store.clone());
        w.append(&Record::new().with("a", 1i64)).unwrap();

        store.set_unavailable(true);
        assert!(matches!(w.commit(), Err(BlobError::Backend(_))));
        assert_eq!(w.records_in_blob(), 0);

        store.set_unavailable(false);
        w.append(&Record::new().with("b", 2i64)).unwrap();
        let stats = w.close().unwrap();
        assert_eq!(stats.blobs, 1);
        assert_eq!(stats.records, 1);
    }

    #[test]
    fn dropping_without_commit_persists_nothing() {
        let store = Arc::new(MemoryBlobStore::new());
        {
            let mut w = writer(1024, store.clone());
            w.append(&Record::new().with("a", 1i64)).unwrap();
        }
        assert_eq!(store.blob_count(), 0);
    }
}
