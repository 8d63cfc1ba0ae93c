//! 日期分区：模板展开、新鲜度窗口与分区解析
//!
//! 分区标识 = `{dataset}/{模板按日期展开}`，模板占位符 `{yyyy}` `{mm}` `{dd}`
//! 用补零的数字替换。

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Days, Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::common::{BlobError, PartitionId, Result, SYSTEM_BLOB_MARKER};
use crate::observability::log_info;
use crate::store::{BlobRef, BlobStore};

pub const DEFAULT_PARTITION_TEMPLATE: &str = "year_{yyyy}/month_{mm}/day_{dd}";

// ── 分区模板 ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartitionTemplate {
    raw: String,
}

impl PartitionTemplate {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut rest = raw;
        while let Some(open) = rest.find('{') {
            let tail = &rest[open + 1..];
            let close = tail.find('}')
                .ok_or_else(|| BlobError::InvalidTemplate(format!("unclosed placeholder in `{raw}`")))?;
            match &tail[..close] {
                "yyyy" | "mm" | "dd" => {}
                other => return Err(BlobError::InvalidTemplate(
                    format!("unknown placeholder `{{{other}}}` in `{raw}`"),
                )),
            }
            rest = &tail[close + 1..];
        }
        if rest.contains('}') {
            return Err(BlobError::InvalidTemplate(format!("stray `}}` in `{raw}`")));
        }
        Ok(Self { raw: raw.into() })
    }

    pub fn expand(&self, date: NaiveDate) -> String {
        use chrono::Datelike;
        self.raw
            .replace("{yyyy}", &format!("{:04}", date.year()))
            .replace("{mm}", &format!("{:02}", date.month()))
            .replace("{dd}", &format!("{:02}", date.day()))
    }

    pub fn as_str(&self) -> &str { &self.raw }

    /// `{dataset}/{展开后的模板}`
    pub fn partition_id(&self, dataset: &str, date: NaiveDate) -> PartitionId {
        let dataset = dataset.trim_end_matches('/');
        if dataset.is_empty() {
            self.expand(date)
        } else {
            format!("{dataset}/{}", self.expand(date))
        }
    }
}

impl Default for PartitionTemplate {
    fn default() -> Self { Self { raw: DEFAULT_PARTITION_TEMPLATE.into() } }
}

impl FromStr for PartitionTemplate {
    type Err = BlobError;
    fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl TryFrom<String> for PartitionTemplate {
    type Error = BlobError;
    fn try_from(s: String) -> Result<Self> { Self::parse(&s) }
}

impl From<PartitionTemplate> for String {
    fn from(t: PartitionTemplate) -> Self { t.raw }
}

// ── 新鲜度窗口 ────────────────────────────────────────────────────────────────

static TIMEDELTA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^((?P<days>-?\d+)d)?((?P<hours>-?\d+)h)?((?P<minutes>-?\d+)m)?((?P<seconds>-?\d+)s)?$",
    )
    .expect("timedelta pattern is valid")
});

/// 人类可读的时间差，如 `30d`、`3d5h19m`、`-5h-30m`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FreshnessLimit(Duration);

impl FreshnessLimit {
    pub fn days(days: i64) -> Self { Self(Duration::days(days)) }

    pub fn parse(text: &str) -> Result<Self> {
        let caps = TIMEDELTA.captures(text.trim())
            .ok_or_else(|| BlobError::InvalidFreshness(text.into()))?;
        let part = |name: &str| -> Result<i64> {
            caps.name(name)
                .map(|m| m.as_str().parse::<i64>()
                    .map_err(|_| BlobError::InvalidFreshness(text.into())))
                .unwrap_or(Ok(0))
        };
        let delta = Duration::try_days(part("days")?)
            .zip(Duration::try_hours(part("hours")?))
            .zip(Duration::try_minutes(part("minutes")?))
            .zip(Duration::try_seconds(part("seconds")?))
            .map(|(((d, h), m), s)| d + h + m + s)
            .ok_or_else(|| BlobError::InvalidFreshness(text.into()))?;
        Ok(Self(delta))
    }

    /// 回溯扫描的整天数；零或负数表示只看请求的日期
    pub fn whole_days(&self) -> u64 {
        self.0.num_days().max(0) as u64
    }
}

impl FromStr for FreshnessLimit {
    type Err = BlobError;
    fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl TryFrom<String> for FreshnessLimit {
    type Error = BlobError;
    fn try_from(s: String) -> Result<Self> { Self::parse(&s) }
}

impl From<FreshnessLimit> for String {
    fn from(f: FreshnessLimit) -> Self { f.to_string() }
}

impl fmt::Display for FreshnessLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.num_seconds();
        if secs % 86_400 == 0 {
            write!(f, "{}d", secs / 86_400)
        } else {
            write!(f, "{secs}s")
        }
    }
}

// ── 日期工具 ──────────────────────────────────────────────────────────────────

/// `start..=end` 的逐日迭代；`end < start` 为 InvalidRange
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Result<impl Iterator<Item = NaiveDate>> {
    if end < start {
        return Err(BlobError::InvalidRange(format!(
            "end_date {end} must be the same or later than start_date {start}",
        )));
    }
    Ok(start.iter_days().take_while(move |d| *d <= end))
}

/// 解析 `YYYY-MM-DD`，也接受带时间的 ISO 形式（`YYYY-MM-DD[T ]HH:MM[:SS]`），时间部分忽略
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let head = text.get(..10)
        .ok_or_else(|| BlobError::InvalidRange(format!("cannot parse date `{text}`")))?;
    let tail = &text[10..];
    if !tail.is_empty() && !tail.starts_with(['T', ' ']) {
        return Err(BlobError::InvalidRange(format!("cannot parse date `{text}`")));
    }
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .map_err(|e| BlobError::InvalidRange(format!("cannot parse date `{text}`: {e}")))
}

// ── Partition ─────────────────────────────────────────────────────────────────

/// 一个已解析的日期分区；按日期排序
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Partition {
    pub date: NaiveDate,
    pub id:   PartitionId,
}

impl Partition {
    pub fn new(date: NaiveDate, id: PartitionId) -> Self { Self { date, id } }
}

// ── PartitionResolver ─────────────────────────────────────────────────────────

/// 只读；不持有任何 blob 字节
#[derive(Clone)]
pub struct PartitionResolver {
    store: Arc<dyn BlobStore>,
}

impl PartitionResolver {
    pub fn new(store: Arc<dyn BlobStore>) -> Self { Self { store } }

    /// 解析 `[start_date, end_date]` 内可读的分区，按日期升序。
    ///
    /// 无新鲜度窗口时返回请求区间内的每一天。
    /// 有窗口时从 `end_date` 起向前最多回溯 `whole_days` 天，找到第一个含已提交
    /// blob 的日期 `found`，返回 `min(start_date, found)..=found`；窗口内全空则为
    /// DataNotFound。
    pub fn resolve(
        &self,
        dataset:    &str,
        template:   &PartitionTemplate,
        start_date: NaiveDate,
        end_date:   NaiveDate,
        freshness:  Option<&FreshnessLimit>,
    ) -> Result<Vec<Partition>> {
        // 先校验区间，再开始访问存储
        let requested = date_range(start_date, end_date)?;
        let window = freshness.map(FreshnessLimit::whole_days).unwrap_or(0);
        if window == 0 {
            return Ok(partitions(dataset, template, requested));
        }

        for back in 0..=window {
            let Some(date) = end_date.checked_sub_days(Days::new(back)) else { break };
            if self.has_data(&template.partition_id(dataset, date))? {
                if back > 0 {
                    log_info!(
                        component = "partition",
                        event = "freshness_fallback",
                        dataset = dataset,
                        requested = %end_date,
                        found = %date
                    );
                }
                let found = date_range(start_date.min(date), date)?;
                return Ok(partitions(dataset, template, found));
            }
        }

        Err(BlobError::DataNotFound(format!(
            "no committed blobs in `{dataset}` within {window} days before {end_date}",
        )))
    }

    pub fn list_blobs(&self, partition: &Partition) -> Result<Vec<BlobRef>> {
        self.store.list_blobs(&partition.id)
    }

    fn has_data(&self, partition: &str) -> Result<bool> {
        Ok(self.store
            .list_blobs(partition)?
            .iter()
            .any(|b| !b.name.contains(SYSTEM_BLOB_MARKER)))
    }
}

fn partitions(
    dataset:  &str,
    template: &PartitionTemplate,
    days:     impl Iterator<Item = NaiveDate>,
) -> Vec<Partition> {
    days.map(|d| Partition::new(d, template.partition_id(dataset, d))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn template_expands_zero_padded() {
        let t = PartitionTemplate::parse("{yyyy}-{mm}-{dd}").unwrap();
        assert_eq!(t.expand(ymd(2021, 3, 7)), "2021-03-07");
        assert_eq!(t.partition_id("tests/data/dated/", ymd(2021, 3, 7)), "tests/data/dated/2021-03-07");
        assert_eq!(PartitionTemplate::default().expand(ymd(2021, 1, 1)), "year_2021/month_01/day_01");
    }

    #[test]
    fn bad_templates_are_rejected() {
        assert!(matches!(PartitionTemplate::parse("{yyyy}/{hh}"), Err(BlobError::InvalidTemplate(_))));
        assert!(matches!(PartitionTemplate::parse("{yyyy"), Err(BlobError::InvalidTemplate(_))));
        assert!(matches!(PartitionTemplate::parse("yyyy}"), Err(BlobError::InvalidTemplate(_))));
    }

    #[test]
    fn freshness_parses_compound_deltas() {
        assert_eq!(FreshnessLimit::parse("30d").unwrap().whole_days(), 30);
        assert_eq!(FreshnessLimit::parse("3d5h19m").unwrap().whole_days(), 3);
        assert_eq!(FreshnessLimit::parse("-1d").unwrap().whole_days(), 0);
        assert_eq!(FreshnessLimit::parse("").unwrap().whole_days(), 0);
        assert_eq!(FreshnessLimit::parse("30d").unwrap().to_string(), "30d");
        assert!(matches!(FreshnessLimit::parse("soon"), Err(BlobError::InvalidFreshness(_))));
    }

    #[test]
    fn date_range_is_inclusive_and_ordered() {
        let days: Vec<_> = date_range(ymd(2020, 12, 30), ymd(2021, 1, 2)).unwrap().collect();
        assert_eq!(days, vec![ymd(2020, 12, 30), ymd(2020, 12, 31), ymd(2021, 1, 1), ymd(2021, 1, 2)]);
        assert!(matches!(date_range(ymd(2021, 1, 2), ymd(2021, 1, 1)), Err(BlobError::InvalidRange(_))));
    }

    #[test]
    fn iso_dates_parse() {
        assert_eq!(parse_date("2021-01-01").unwrap(), ymd(2021, 1, 1));
        assert_eq!(parse_date("2021-01-01T10:30").unwrap(), ymd(2021, 1, 1));
        assert_eq!(parse_date("2021-01-01 10:30:15").unwrap(), ymd(2021, 1, 1));
        assert!(parse_date("2021/01/01").is_err());
        assert!(parse_date("2021-01-01X").is_err());
        assert!(parse_date("2021").is_err());
    }

    #[test]
    fn inverted_range_fails_before_any_store_access() {
        let store = Arc::new(crate::store::MemoryBlobStore::new());
        store.set_unavailable(true);
        let resolver = PartitionResolver::new(store);
        let template = PartitionTemplate::default();
        let err = resolver
            .resolve("data", &template, ymd(2021, 1, 2), ymd(2021, 1, 1), Some(&FreshnessLimit::days(30)))
            .unwrap_err();
        assert!(matches!(err, BlobError::InvalidRange(_)));
    }

    #[test]
    fn no_window_lists_requested_days_without_probing() {
        let store = Arc::new(crate::store::MemoryBlobStore::new());
        store.set_unavailable(true);
        let resolver = PartitionResolver::new(store);
        let days = resolver
            .resolve("data", &PartitionTemplate::default(), ymd(2021, 1, 1), ymd(2021, 1, 3), None)
            .unwrap();
        assert_eq!(days.len(), 3);
        assert_eq!(days[2].id, "data/year_2021/month_01/day_03");
    }
}
