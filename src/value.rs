//! 记录与属性值
//!
//! 属性值是封闭的标签联合 {Bool, Int, Double, String, Timestamp, List}。
//! 宿主类型（日期、集合、JSON 等）在进入核心前通过 `From` / `TryFrom` 收敛到这里。
//!
//! 行格式（JSON Lines）：
//! ```text
//! {"name":"water","elements":["hydrogen","oxygen"],"at":{"$timestamp":"2021-01-01T00:00:00"}}\n
//! ```
//! 时间戳写成单键对象，保证行格式自描述且可往返。

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Number, Value as Json};

use crate::common::{BlobError, Result};

pub const TIMESTAMP_TAG: &str = "$timestamp";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

// ── ValueType ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Boolean,
    Integer,
    Double,
    Varchar,
    Timestamp,
    List,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean   => "BOOLEAN",
            Self::Integer   => "INTEGER",
            Self::Double    => "DOUBLE",
            Self::Varchar   => "VARCHAR",
            Self::Timestamp => "TIMESTAMP",
            Self::List      => "LIST",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Value ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Timestamp(NaiveDateTime),
    List(Vec<Value>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_)      => ValueType::Boolean,
            Self::Int(_)       => ValueType::Integer,
            Self::Double(_)    => ValueType::Double,
            Self::String(_)    => ValueType::Varchar,
            Self::Timestamp(_) => ValueType::Timestamp,
            Self::List(_)      => ValueType::List,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self { Self::List(items) => Some(items), _ => None }
    }

    /// 转成行格式里的 JSON；非有限浮点数无法表示
    pub(crate) fn to_json(&self) -> Result<Json> {
        Ok(match self {
            Self::Bool(b)      => Json::Bool(*b),
            Self::Int(i)       => Json::Number((*i).into()),
            Self::Double(d)    => Json::Number(Number::from_f64(*d).ok_or_else(|| {
                BlobError::Serialization(format!("double `{d}` has no JSON representation"))
            })?),
            Self::String(s)    => Json::String(s.clone()),
            Self::Timestamp(t) => {
                let mut tagged = Map::with_capacity(1);
                tagged.insert(TIMESTAMP_TAG.into(), Json::String(t.format(TIMESTAMP_FORMAT).to_string()));
                Json::Object(tagged)
            }
            Self::List(items)  => Json::Array(
                items.iter().map(Value::to_json).collect::<Result<Vec<_>>>()?,
            ),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b)      => write!(f, "{b}"),
            Self::Int(i)       => write!(f, "{i}"),
            Self::Double(d)    => write!(f, "{d:?}"),
            Self::String(s)    => write!(f, "{s}"),
            Self::Timestamp(t) => write!(f, "{}", t.format(TIMESTAMP_FORMAT)),
            Self::List(items)  => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 { f.write_str(", ")?; }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

// ── 宿主类型收敛 ──────────────────────────────────────────────────────────────

impl From<bool>   for Value { fn from(v: bool)   -> Self { Self::Bool(v) } }
impl From<i64>    for Value { fn from(v: i64)    -> Self { Self::Int(v) } }
impl From<i32>    for Value { fn from(v: i32)    -> Self { Self::Int(v.into()) } }
impl From<u32>    for Value { fn from(v: u32)    -> Self { Self::Int(v.into()) } }
impl From<f64>    for Value { fn from(v: f64)    -> Self { Self::Double(v) } }
impl From<f32>    for Value { fn from(v: f32)    -> Self { Self::Double(v.into()) } }
impl From<&str>   for Value { fn from(v: &str)   -> Self { Self::String(v.into()) } }
impl From<String> for Value { fn from(v: String) -> Self { Self::String(v) } }

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self { Self::Timestamp(v) }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self { Self::Timestamp(v.naive_utc()) }
}

/// 日期提升为当天零点的时间戳
impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self { Self::Timestamp(v.and_time(NaiveTime::MIN)) }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self { Self::List(v.into_iter().map(Into::into).collect()) }
}

impl<T: Into<Value>> From<BTreeSet<T>> for Value {
    fn from(v: BTreeSet<T>) -> Self { Self::List(v.into_iter().map(Into::into).collect()) }
}

/// 无序集合按迭代顺序展开；索引按元素处理，顺序不影响结果
impl<T: Into<Value>> From<HashSet<T>> for Value {
    fn from(v: HashSet<T>) -> Self { Self::List(v.into_iter().map(Into::into).collect()) }
}

impl TryFrom<u64> for Value {
    type Error = BlobError;

    fn try_from(v: u64) -> Result<Self> {
        i64::try_from(v)
            .map(Self::Int)
            .map_err(|_| BlobError::unsupported(v, "u64"))
    }
}

impl TryFrom<Json> for Value {
    type Error = BlobError;

    fn try_from(json: Json) -> Result<Self> {
        match json {
            Json::Null        => Err(BlobError::unsupported("null", "null")),
            Json::Bool(b)     => Ok(Self::Bool(b)),
            Json::Number(n)   => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if n.is_f64() {
                    n.as_f64()
                        .map(Self::Double)
                        .ok_or_else(|| BlobError::unsupported(&n, "number"))
                } else {
                    Err(BlobError::unsupported(&n, "number"))
                }
            }
            Json::String(s)   => Ok(Self::String(s)),
            Json::Array(items) => Ok(Self::List(
                items.into_iter().map(Value::try_from).collect::<Result<Vec<_>>>()?,
            )),
            Json::Object(map) => timestamp_from_tagged(map),
        }
    }
}

fn timestamp_from_tagged(map: Map<String, Json>) -> Result<Value> {
    if map.len() == 1 {
        if let Some(Json::String(text)) = map.get(TIMESTAMP_TAG) {
            return NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
                .map(Value::Timestamp)
                .map_err(|e| BlobError::Decode(format!("bad timestamp `{text}`: {e}")));
        }
    }
    Err(BlobError::unsupported(Json::Object(map), "object"))
}

// ── Record ────────────────────────────────────────────────────────────────────

/// 有序属性映射；相等比较与属性顺序无关
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    attributes: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attributes.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> { self.attributes.get(name) }
    pub fn len(&self)      -> usize { self.attributes.len() }
    pub fn is_empty(&self) -> bool  { self.attributes.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 序列化为一行（含结尾换行符）
    pub fn to_line(&self) -> Result<Vec<u8>> {
        let mut line = serde_json::to_vec(&self.to_json()?)
            .map_err(|e| BlobError::Serialization(e.to_string()))?;
        line.push(b'\n');
        Ok(line)
    }

    /// 解析一行；结尾换行符可有可无
    pub fn from_line(line: &[u8]) -> Result<Self> {
        let json: Json = serde_json::from_slice(line)
            .map_err(|e| BlobError::Decode(e.to_string()))?;
        match json {
            Json::Object(map) => Self::from_json(map),
            other => Err(BlobError::Decode(format!("line is not a JSON object: {other}"))),
        }
    }

    pub(crate) fn to_json(&self) -> Result<Json> {
        let mut map = Map::with_capacity(self.attributes.len());
        for (name, value) in &self.attributes {
            map.insert(name.clone(), value.to_json()?);
        }
        Ok(Json::Object(map))
    }

    pub(crate) fn from_json(map: Map<String, Json>) -> Result<Self> {
        let mut attributes = IndexMap::with_capacity(map.len());
        for (name, json) in map {
            attributes.insert(name, Value::try_from(json)?);
        }
        Ok(Self { attributes })
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_round_trip_keeps_types() {
        let at = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap().and_hms_opt(12, 30, 5).unwrap();
        let record = Record::new()
            .with("flag", true)
            .with("count", 123i64)
            .with("ratio", 123.0f64)
            .with("name", "water")
            .with("at", at)
            .with("elements", vec!["hydrogen", "oxygen"]);

        let line = record.to_line().unwrap();
        assert_eq!(line.last(), Some(&b'\n'));
        assert_eq!(line.iter().filter(|b| **b == b'\n').count(), 1);

        let decoded = Record::from_line(&line).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.get("ratio"), Some(&Value::Double(123.0)));
        assert_eq!(decoded.get("count"), Some(&Value::Int(123)));
    }

    #[test]
    fn attribute_order_is_preserved() {
        let record = Record::new().with("b", 1i64).with("a", 2i64);
        let decoded = Record::from_line(&record.to_line().unwrap()).unwrap();
        let names: Vec<_> = decoded.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn non_finite_double_fails_serialization() {
        let record = Record::new().with("x", f64::NAN);
        assert!(matches!(record.to_line(), Err(BlobError::Serialization(_))));
    }

    #[test]
    fn dates_are_promoted_to_midnight() {
        let date = NaiveDate::from_ymd_opt(2020, 2, 29).unwrap();
        let expected = date.and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(Value::from(date), Value::Timestamp(expected));
    }

    #[test]
    fn unsupported_json_names_value_and_type() {
        let err = Value::try_from(serde_json::json!({"nested": 1})).unwrap_err();
        match err {
            BlobError::UnsupportedType { value, type_name } => {
                assert_eq!(type_name, "object");
                assert!(value.contains("nested"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(Value::try_from(Json::Null), Err(BlobError::UnsupportedType { .. })));
        assert!(matches!(Value::try_from(u64::MAX), Err(BlobError::UnsupportedType { .. })));
    }

    #[test]
    fn sets_become_lists() {
        let set: BTreeSet<&str> = ["sodium", "chlorine"].into_iter().collect();
        let value = Value::from(set);
        assert_eq!(value.value_type(), ValueType::List);
        assert_eq!(value.as_list().map(<[Value]>::len), Some(2));
    }
}
