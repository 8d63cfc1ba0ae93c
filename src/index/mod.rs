//! 内存二级索引：字段值 → 行号
//!
//! ```text
//!  rows ──► IndexBuilder::add(row_id, record)
//!              │ record[field]
//!              ▼
//!          KeyCoercer::normalize
//!              │ 标量 → 一个键；列表 → 每个不同元素一个键
//!              ▼
//!          BTree<IndexKey, {RowId}>  ──► Index::search / Index::range
//! ```
//!
//! 行号由调用方给出，通常是记录在读取流中的位置。缺少该字段的记录不进入索引。

pub mod btree;
pub mod key;

use std::collections::BTreeSet;

use crate::common::{Result, RowId};
use crate::observability::log_debug;
use crate::value::{Record, Value};

pub use btree::BTree;
pub use key::{IndexKey, KeyCoercer, Normalized, TypeRank};

// ── IndexBuilder ──────────────────────────────────────────────────────────────

pub struct IndexBuilder {
    field:   String,
    tree:    BTree,
    skipped: u64,
}

impl IndexBuilder {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into(), tree: BTree::new(), skipped: 0 }
    }

    pub fn add(&mut self, row: RowId, record: &Record) -> Result<()> {
        let Some(value) = record.get(&self.field) else {
            self.skipped += 1;
            return Ok(());
        };
        match KeyCoercer::normalize(value)? {
            Normalized::Scalar(key) => self.tree.insert(key, row),
            Normalized::Elements(keys) => {
                for key in keys {
                    self.tree.insert(key, row);
                }
            }
        }
        Ok(())
    }

    pub fn build(self) -> Index {
        log_debug!(
            component = "index",
            event = "index_built",
            field = %self.field,
            keys = self.tree.len(),
            skipped_rows = self.skipped
        );
        Index { field: self.field, tree: self.tree }
    }
}

// ── Index ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Index {
    field: String,
    tree:  BTree,
}

impl Index {
    /// 以枚举序号作为行号建立索引
    pub fn build_index<'a, I>(records: I, field: &str) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut builder = IndexBuilder::new(field);
        for (row, record) in records.into_iter().enumerate() {
            builder.add(row as RowId, record)?;
        }
        Ok(builder.build())
    }

    /// 等值查找。列表作为探测值时不匹配任何行。
    pub fn search(&self, value: &Value) -> Result<BTreeSet<RowId>> {
        Ok(match KeyCoercer::normalize(value)? {
            Normalized::Scalar(key) => self.tree.get(&key).cloned().unwrap_or_default(),
            Normalized::Elements(_) => BTreeSet::new(),
        })
    }

    /// `[lo, hi]` 内所有键对应行号的并集，两端须为同一类型
    pub fn range(&self, lo: &Value, hi: &Value) -> Result<BTreeSet<RowId>> {
        let lo = KeyCoercer::normalize_scalar(lo)?;
        let hi = KeyCoercer::normalize_scalar(hi)?;
        Ok(self.tree.range(&lo, &hi)?
            .flat_map(|(_, rows)| rows.iter().copied())
            .collect())
    }

    pub fn field(&self) -> &str { &self.field }
    pub fn key_count(&self) -> usize { self.tree.len() }
    pub fn tree(&self) -> &BTree { &self.tree }
}
