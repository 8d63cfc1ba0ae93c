//! 结构化日志
//!
//! 全部事件走 `tracing`，target 固定为 `blob_engine`，并带 `event` 字段便于过滤。
//! 库本身从不安装 subscriber，由应用自行配置。

pub(crate) const LOG_TARGET: &str = "blob_engine";

macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::LOG_TARGET, $($field)*)
    };
}

macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::LOG_TARGET, $($field)*)
    };
}

macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::LOG_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_info;
pub(crate) use log_warn;
