//! # blob-storage-engine 使用案例
//!
//! 1. 配置写入器（zstd，小 blob 以便观察轮转）
//! 2. 写入并提交两天的数据
//! 3. 按日期区间读取
//! 4. 新鲜度回退：请求日期没有数据时向前查找
//! 5. 在读出的记录上建立二级索引

use std::sync::Arc;

use blob_storage_engine::{
    BlobReader, BlobWriter, Codec, FreshnessLimit, Index, MemoryBlobStore, PartitionTemplate,
    ReadOptions, Record, Result, Value, WriterConfig,
};
use chrono::NaiveDate;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blob_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("═══════════════════════════════════════════════════════════");
    println!("   blob-storage-engine 演示                                ");
    println!("═══════════════════════════════════════════════════════════\n");

    let store    = Arc::new(MemoryBlobStore::new());
    let template = PartitionTemplate::parse("{yyyy}-{mm}-{dd}")?;
    let day      = |d: u32| NaiveDate::from_ymd_opt(2021, 1, d).unwrap_or_default();

    // =========================================================================
    // 1. 配置写入器
    // =========================================================================
    println!("【1】配置写入器 ...");
    let config = WriterConfig::new("demo/orders")
        .with_partition_template(template.clone())
        .with_codec(Codec::Zstd)
        .with_blob_size(512);
    println!("    codec     = {}", config.codec);
    println!("    blob_size = {}\n", config.blob_size);

    // =========================================================================
    // 2. 写入两天的数据
    // =========================================================================
    println!("【2】写入 2021-01-03 与 2021-01-04 ...");
    for d in [3, 4] {
        let mut writer = BlobWriter::new(config.clone().with_partition_date(day(d)), store.clone())?;
        for i in 0..20i64 {
            let record = Record::new()
                .with("order_id", i + 100 * d as i64)
                .with("status", if i % 3 == 0 { "shipped" } else { "pending" })
                .with("amount", i as f64 * 1.25)
                .with("tags", vec!["web", if i % 2 == 0 { "promo" } else { "full-price" }]);
            writer.append(&record)?;
        }
        let stats = writer.close()?;
        println!(
            "    {} → blobs={} records={} raw={}B committed={}B",
            day(d), stats.blobs, stats.records, stats.raw_bytes, stats.committed_bytes,
        );
    }
    println!("    store 内共 {} 个 blob\n", store.blob_count());

    // =========================================================================
    // 3. 按日期区间读取
    // =========================================================================
    println!("【3】读取 2021-01-03 ..= 2021-01-04 ...");
    let reader  = BlobReader::new(store.clone());
    let options = ReadOptions::new("demo/orders", day(3))
        .with_dates(day(3), day(4))
        .with_partition_template(template.clone());
    let records = reader.read(&options)?.collect::<Result<Vec<_>>>()?;
    println!("    读出 {} 条记录\n", records.len());

    // =========================================================================
    // 4. 新鲜度回退
    // =========================================================================
    println!("【4】请求 2021-01-10，新鲜度窗口 7d ...");
    let fresh = ReadOptions::new("demo/orders", day(10))
        .with_partition_template(template)
        .with_freshness_limit(FreshnessLimit::days(7));
    let latest = reader.read(&fresh)?.collect::<Result<Vec<_>>>()?;
    println!("    回退后读出 {} 条记录（来自 2021-01-04）\n", latest.len());

    // =========================================================================
    // 5. 二级索引
    // =========================================================================
    println!("【5】按 status / tags 建立索引 ...");
    let by_status = Index::build_index(&records, "status")?;
    let by_tag    = Index::build_index(&records, "tags")?;
    println!("    status 不同取值 = {}", by_status.key_count());
    println!("    shipped 行数    = {}", by_status.search(&Value::from("shipped"))?.len());
    println!("    promo 行数      = {}", by_tag.search(&Value::from("promo"))?.len());

    println!("\n✓ 演示完成");
    Ok(())
}
