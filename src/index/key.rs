//! 索引键归一化
//!
//! 同一字段可能混入不同类型的值。所有标量先按类型等级排序，再在类型内按值排序：
//!
//! ```text
//! Boolean < Integer < Double < Timestamp < String
//! ```
//!
//! 因此任意两个键总能比较，整数 `123` 与浮点 `123.0` 是两个不同的键。

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDateTime;

use crate::common::{BlobError, Result};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeRank {
    Boolean,
    Integer,
    Double,
    Timestamp,
    String,
}

impl TypeRank {
    /// 本等级内最小的键
    pub(crate) fn min_key(self) -> IndexKey {
        match self {
            Self::Boolean   => IndexKey::Bool(false),
            Self::Integer   => IndexKey::Int(i64::MIN),
            // total_cmp 下全 1 位模式的负 NaN 最小
            Self::Double    => IndexKey::Double(f64::from_bits(u64::MAX)),
            Self::Timestamp => IndexKey::Timestamp(NaiveDateTime::MIN),
            Self::String    => IndexKey::String(String::new()),
        }
    }
}

// ── IndexKey ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum IndexKey {
    Bool(bool),
    Int(i64),
    Double(f64),
    Timestamp(NaiveDateTime),
    String(String),
}

impl IndexKey {
    pub fn rank(&self) -> TypeRank {
        match self {
            Self::Bool(_)      => TypeRank::Boolean,
            Self::Int(_)       => TypeRank::Integer,
            Self::Double(_)    => TypeRank::Double,
            Self::Timestamp(_) => TypeRank::Timestamp,
            Self::String(_)    => TypeRank::String,
        }
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a),      Self::Bool(b))      => a.cmp(b),
            (Self::Int(a),       Self::Int(b))       => a.cmp(b),
            (Self::Double(a),    Self::Double(b))    => a.total_cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::String(a),    Self::String(b))    => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for IndexKey {}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b)      => write!(f, "{b}"),
            Self::Int(i)       => write!(f, "{i}"),
            Self::Double(d)    => write!(f, "{d:?}"),
            Self::Timestamp(t) => write!(f, "{t}"),
            Self::String(s)    => write!(f, "{s:?}"),
        }
    }
}

// ── KeyCoercer ────────────────────────────────────────────────────────────────

/// 归一化结果：标量得到一个键，列表得到去重后的元素键（不是一个组合键）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Scalar(IndexKey),
    Elements(Vec<IndexKey>),
}

pub struct KeyCoercer;

impl KeyCoercer {
    pub fn normalize(value: &Value) -> Result<Normalized> {
        match value {
            Value::List(items) => {
                let distinct: BTreeSet<IndexKey> = items.iter()
                    .map(Self::normalize_scalar)
                    .collect::<Result<_>>()?;
                Ok(Normalized::Elements(distinct.into_iter().collect()))
            }
            scalar => Self::normalize_scalar(scalar).map(Normalized::Scalar),
        }
    }

    /// 列表元素本身是列表时无法成为键
    pub fn normalize_scalar(value: &Value) -> Result<IndexKey> {
        Ok(match value {
            Value::Bool(b)      => IndexKey::Bool(*b),
            Value::Int(i)       => IndexKey::Int(*i),
            // -0.0 与 0.0 视为同一个键
            Value::Double(d)    => IndexKey::Double(if *d == 0.0 { 0.0 } else { *d }),
            Value::Timestamp(t) => IndexKey::Timestamp(*t),
            Value::String(s)    => IndexKey::String(s.clone()),
            Value::List(_)      => return Err(BlobError::unsupported(value, "nested list")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn keys_order_by_rank_then_value() {
        let ts = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let mut keys = vec![
            IndexKey::String("a".into()),
            IndexKey::Timestamp(ts),
            IndexKey::Double(-1.5),
            IndexKey::Int(500),
            IndexKey::Int(-3),
            IndexKey::Bool(true),
            IndexKey::Bool(false),
        ];
        keys.sort();
        let ranks: Vec<_> = keys.iter().map(IndexKey::rank).collect();
        assert_eq!(ranks, vec![
            TypeRank::Boolean, TypeRank::Boolean, TypeRank::Integer, TypeRank::Integer,
            TypeRank::Double, TypeRank::Timestamp, TypeRank::String,
        ]);
        assert_eq!(keys[2], IndexKey::Int(-3));
        assert!(IndexKey::String(String::new()) > IndexKey::Int(i64::MAX));
    }

    #[test]
    fn integer_and_double_are_distinct_keys() {
        assert_ne!(IndexKey::Int(123), IndexKey::Double(123.0));
        assert_eq!(IndexKey::Double(f64::NAN), IndexKey::Double(f64::NAN));
    }

    #[test]
    fn lists_contribute_distinct_elements() {
        let value = Value::from(vec!["carbon", "oxygen", "carbon"]);
        let Normalized::Elements(keys) = KeyCoercer::normalize(&value).unwrap() else {
            panic!("list must normalize to elements");
        };
        assert_eq!(keys, vec![IndexKey::String("carbon".into()), IndexKey::String("oxygen".into())]);
    }

    #[test]
    fn nested_lists_are_unsupported() {
        let value = Value::List(vec![Value::from(vec![1i64])]);
        assert!(matches!(KeyCoercer::normalize(&value), Err(BlobError::UnsupportedType { .. })));
    }

    #[test]
    fn negative_zero_matches_zero() {
        assert_eq!(
            KeyCoercer::normalize_scalar(&Value::Double(-0.0)).unwrap(),
            IndexKey::Double(0.0),
        );
    }

    #[test]
    fn rank_minimum_is_below_every_key_of_rank() {
        assert!(TypeRank::Double.min_key() <= IndexKey::Double(f64::NEG_INFINITY));
        assert!(TypeRank::Double.min_key() > IndexKey::Int(i64::MAX));
        assert!(TypeRank::Integer.min_key() <= IndexKey::Int(i64::MIN));
    }
}
