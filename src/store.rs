//! BlobStore 边界
//!
//! 核心只依赖三个能力：提交字节、列出分区内的 blob、读取 blob 字节。
//! 磁盘 / 对象存储 / 文档库适配器各自独立实现 [`BlobStore`]。
//! [`MemoryBlobStore`] 是进程内的参考实现，供测试与演示使用。

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::common::{BlobError, Result, BACKOUT_MARKER};

/// blob 引用（存储端分配的最终名称）
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlobRef {
    pub name: String,
}

impl BlobRef {
    pub fn new(name: impl Into<String>) -> Self { Self { name: name.into() } }
}

pub trait BlobStore: Send + Sync {
    /// 持久化字节，返回最终名称。
    ///
    /// 名称可能与 `preferred_name` 不同；若包含 [`BACKOUT_MARKER`]，
    /// 说明数据被改投到了失败区。
    fn commit(&self, bytes: &[u8], preferred_name: Option<&str>) -> Result<String>;

    /// 列出分区下的全部 blob，按名称升序
    fn list_blobs(&self, partition: &str) -> Result<Vec<BlobRef>>;

    fn read_bytes(&self, blob: &BlobRef) -> Result<Vec<u8>>;
}

// ── MemoryBlobStore ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct MemoryState {
    blobs:          BTreeMap<String, Vec<u8>>,
    reroute:        bool,
    unavailable:    bool,
    next_anonymous: u64,
}

/// 线程安全的内存 BlobStore
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    state: RwLock<MemoryState>,
}

impl MemoryBlobStore {
    pub fn new() -> Self { Self::default() }

    /// 打开后，所有提交都被改投到 `BACKOUT/` 前缀下
    pub fn set_reroute_to_backout(&self, reroute: bool) {
        self.state.write().reroute = reroute;
    }

    /// 模拟后端不可用：commit / list / read 全部失败
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unavailable = unavailable;
    }

    /// 直接放入一个 blob（例如系统元数据 blob）
    pub fn put(&self, name: impl Into<String>, bytes: Vec<u8>) {
        self.state.write().blobs.insert(name.into(), bytes);
    }

    pub fn blob_count(&self) -> usize { self.state.read().blobs.len() }

    pub fn names(&self) -> Vec<String> {
        self.state.read().blobs.keys().cloned().collect()
    }

    fn check_available(state: &MemoryState) -> Result<()> {
        if state.unavailable {
            return Err(BlobError::Backend("memory store marked unavailable".into()));
        }
        Ok(())
    }
}

impl BlobStore for MemoryBlobStore {
    fn commit(&self, bytes: &[u8], preferred_name: Option<&str>) -> Result<String> {
        let mut state = self.state.write();
        Self::check_available(&state)?;

        let base = match preferred_name {
            Some(name) => name.to_string(),
            None => {
                state.next_anonymous += 1;
                format!("blob-{:08}", state.next_anonymous)
            }
        };
        let name = if state.reroute {
            format!("{BACKOUT_MARKER}/{base}")
        } else {
            base
        };
        state.blobs.insert(name.clone(), bytes.to_vec());
        Ok(name)
    }

    fn list_blobs(&self, partition: &str) -> Result<Vec<BlobRef>> {
        let state = self.state.read();
        Self::check_available(&state)?;
        let prefix = format!("{}/", partition.trim_end_matches('/'));
        Ok(state.blobs
            .range(prefix.clone()..)
            .take_while(|(name, _)| name.starts_with(&prefix))
            .map(|(name, _)| BlobRef::new(name.clone()))
            .collect())
    }

    fn read_bytes(&self, blob: &BlobRef) -> Result<Vec<u8>> {
        let state = self.state.read();
        Self::check_available(&state)?;
        state.blobs
            .get(&blob.name)
            .cloned()
            .ok_or_else(|| BlobError::Backend(format!("blob not found: {}", blob.name)))
    }
}
