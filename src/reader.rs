//! BlobReader：按分区日期升序、blob 写入顺序惰性地流出记录
//!
//! 每次调用 [`BlobReader::records`] 都从头开始一个新的只进迭代。
//! 任一行解码失败（或存储端出错）时迭代器产出一个 `Err` 后结束，
//! 即对本次读取是致命的。

use std::collections::VecDeque;
use std::sync::Arc;

use crate::codec::Codec;
use crate::common::{Result, SYSTEM_BLOB_MARKER};
use crate::config::ReadOptions;
use crate::observability::log_debug;
use crate::partition::{Partition, PartitionResolver};
use crate::store::{BlobRef, BlobStore};
use crate::value::Record;

#[derive(Clone)]
pub struct BlobReader {
    store:          Arc<dyn BlobStore>,
    fallback_codec: Codec,
}

impl BlobReader {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store, fallback_codec: Codec::default() }
    }

    /// blob 扩展名无法识别时使用的编解码
    pub fn with_fallback_codec(mut self, codec: Codec) -> Self {
        self.fallback_codec = codec;
        self
    }

    /// 流出给定分区内的全部记录
    pub fn records(&self, partitions: &[Partition]) -> RecordIter {
        let mut ordered = partitions.to_vec();
        ordered.sort();
        RecordIter {
            store:          Arc::clone(&self.store),
            fallback_codec: self.fallback_codec,
            partitions:     ordered.into(),
            blobs:          VecDeque::new(),
            current:        None,
            done:           false,
        }
    }

    /// 解析分区并流出记录
    pub fn read(&self, options: &ReadOptions) -> Result<RecordIter> {
        let partitions = PartitionResolver::new(Arc::clone(&self.store)).resolve(
            &options.dataset,
            &options.partition_template,
            options.start_date,
            options.end_date,
            options.freshness_limit.as_ref(),
        )?;
        Ok(Self { fallback_codec: options.fallback_codec, ..self.clone() }.records(&partitions))
    }
}

// ── RecordIter ────────────────────────────────────────────────────────────────

/// 已解压的单个 blob 及读取游标
struct DecodedBlob {
    name:   String,
    data:   Vec<u8>,
    cursor: usize,
}

impl DecodedBlob {
    /// 下一条非空行在 `data` 中的区间
    fn next_line(&mut self) -> Option<std::ops::Range<usize>> {
        while self.cursor < self.data.len() {
            let start = self.cursor;
            let len   = self.data[start..].iter().position(|b| *b == b'\n')
                .unwrap_or(self.data.len() - start);
            self.cursor += len + 1;
            if len > 0 {
                return Some(start..start + len);
            }
        }
        None
    }
}

pub struct RecordIter {
    store:          Arc<dyn BlobStore>,
    fallback_codec: Codec,
    partitions:     VecDeque<Partition>,
    blobs:          VecDeque<BlobRef>,
    current:        Option<DecodedBlob>,
    done:           bool,
}

impl RecordIter {
    fn step(&mut self) -> Result<Option<Record>> {
        loop {
            if let Some(blob) = self.current.as_mut() {
                if let Some(range) = blob.next_line() {
                    return Record::from_line(&blob.data[range]).map(Some).map_err(|e| {
                        log_debug!(
                            component = "reader",
                            event = "record_decode_failed",
                            blob = %blob.name,
                            error = %e
                        );
                        e
                    });
                }
                self.current = None;
            }

            if let Some(blob) = self.blobs.pop_front() {
                let codec = Codec::for_blob_name(&blob.name).unwrap_or(self.fallback_codec);
                let bytes = self.store.read_bytes(&blob)?;
                let data  = codec.decode(&bytes)?;
                self.current = Some(DecodedBlob { name: blob.name, data, cursor: 0 });
                continue;
            }

            let Some(partition) = self.partitions.pop_front() else {
                return Ok(None);
            };
            let mut blobs = self.store.list_blobs(&partition.id)?;
            blobs.sort();
            for blob in blobs {
                if blob.name.contains(SYSTEM_BLOB_MARKER) {
                    log_debug!(
                        component = "reader",
                        event = "system_blob_skipped",
                        blob = %blob.name
                    );
                    continue;
                }
                self.blobs.push_back(blob);
            }
        }
    }
}

impl Iterator for RecordIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None)         => { self.done = true; None }
            Err(e)           => { self.done = true; Some(Err(e)) }
        }
    }
}

impl std::iter::FusedIterator for RecordIter {}
