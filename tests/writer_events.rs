use std::fmt;
use std::sync::Arc;

use blob_storage_engine::{BlobWriter, Codec, MemoryBlobStore, Record, WriterConfig};
use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// 收集 `blob_engine` target 下每条事件的 (level, event 字段)
#[derive(Clone, Default)]
struct CapturedEvents(Arc<Mutex<Vec<(Level, String)>>>);

impl CapturedEvents {
    fn named(&self, level: Level, name: &str) -> usize {
        self.0.lock().iter().filter(|(l, e)| *l == level && e == name).count()
    }

    fn at_level(&self, level: Level) -> usize {
        self.0.lock().iter().filter(|(l, _)| *l == level).count()
    }
}

struct EventName(Option<String>);

impl Visit for EventName {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "event" {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "event" {
            self.0 = Some(format!("{value:?}").trim_matches('"').to_string());
        }
    }
}

impl<S: Subscriber> Layer<S> for CapturedEvents {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() != "blob_engine" {
            return;
        }
        let mut name = EventName(None);
        event.record(&mut name);
        self.0.lock().push((*event.metadata().level(), name.0.unwrap_or_default()));
    }
}

fn commit_one(store: Arc<MemoryBlobStore>) {
    let cfg = WriterConfig::new("events")
        .with_codec(Codec::Jsonl)
        .with_partition_date(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
    let mut writer = BlobWriter::new(cfg, store).unwrap();
    writer.append(&Record::new().with("a", 1i64)).unwrap();
    writer.close().unwrap();
}

fn captured(run: impl FnOnce()) -> CapturedEvents {
    let events = CapturedEvents::default();
    let subscriber = tracing_subscriber::registry().with(events.clone());
    tracing::subscriber::with_default(subscriber, run);
    events
}

#[test]
fn rerouted_commit_logs_one_warning() {
    let store = Arc::new(MemoryBlobStore::new());
    store.set_reroute_to_backout(true);
    let events = captured(|| commit_one(store));

    assert_eq!(events.named(Level::WARN, "blob_rerouted"), 1);
    assert_eq!(events.at_level(Level::WARN), 1);
    assert_eq!(events.named(Level::DEBUG, "blob_committed"), 1);
}

#[test]
fn normal_commit_logs_no_warning() {
    let store = Arc::new(MemoryBlobStore::new());
    let events = captured(|| commit_one(store));

    assert_eq!(events.at_level(Level::WARN), 0);
    assert_eq!(events.named(Level::DEBUG, "blob_committed"), 1);
}

#[test]
fn dropping_with_pending_records_warns() {
    let store = Arc::new(MemoryBlobStore::new());
    let events = captured(|| {
        let mut writer = BlobWriter::new(WriterConfig::new("events"), store.clone()).unwrap();
        writer.append(&Record::new().with("a", 1i64)).unwrap();
    });

    assert_eq!(events.named(Level::WARN, "writer_dropped_with_pending"), 1);
    assert_eq!(store.blob_count(), 0);
}
