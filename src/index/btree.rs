//! 有序键 → 行号集合
//!
//! 同一个键可对应多行；一行也可以出现在多个键下（列表字段的每个元素各占一个键）。

use std::collections::{BTreeMap, BTreeSet};

use crate::common::{BlobError, Result, RowId};
use crate::index::key::{IndexKey, TypeRank};

#[derive(Debug, Clone, Default)]
pub struct BTree {
    map: BTreeMap<IndexKey, BTreeSet<RowId>>,
}

impl BTree {
    pub fn new() -> Self { Self::default() }

    /// 重复插入同一 (key, row) 不会报错
    pub fn insert(&mut self, key: IndexKey, row: RowId) {
        self.map.entry(key).or_default().insert(row);
    }

    pub fn get(&self, key: &IndexKey) -> Option<&BTreeSet<RowId>> {
        self.map.get(key)
    }

    /// 闭区间 `[lo, hi]` 内的键，两端必须属于同一类型等级
    pub fn range<'a>(
        &'a self,
        lo: &IndexKey,
        hi: &IndexKey,
    ) -> Result<impl Iterator<Item = (&'a IndexKey, &'a BTreeSet<RowId>)> + 'a> {
        if lo.rank() != hi.rank() {
            return Err(BlobError::InvalidRange(format!(
                "range bounds have different types: {lo} ({:?}) .. {hi} ({:?})",
                lo.rank(), hi.rank(),
            )));
        }
        if lo > hi {
            return Err(BlobError::InvalidRange(format!("lower bound {lo} is above {hi}")));
        }
        Ok(self.map.range(lo.clone()..=hi.clone()))
    }

    /// 某一类型等级下的全部键，按值升序
    pub fn iter_rank(
        &self,
        rank: TypeRank,
    ) -> impl Iterator<Item = (&IndexKey, &BTreeSet<RowId>)> + '_ {
        self.map
            .range(rank.min_key()..)
            .take_while(move |(key, _)| key.rank() == rank)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IndexKey, &BTreeSet<RowId>)> + '_ {
        self.map.iter()
    }

    /// 不同键的个数
    pub fn len(&self) -> usize { self.map.len() }
    pub fn is_empty(&self) -> bool { self.map.is_empty() }
}
