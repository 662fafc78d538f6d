//! # Dispatcher
//!
//! 限速文档分发模块。
//!
//! 负责：
//! - 有界队列接收生产者提交的文档（满时背压）
//! - 单一调度循环按 `interval / N` 节奏放行，最多 N 个并发投递
//! - 通过 `Transport` 投递，单个失败不影响其他文档
//! - `DispatcherCell` 提供显式共享、只构造一次的实例

mod cell;
mod dispatcher;
mod error;
mod metrics;
mod pacer;
mod queue;
mod scheduler;
pub mod transports;
mod worker;

pub use cell::DispatcherCell;
pub use contracts::{DeliveryReport, DispatchConfig, Transport};
pub use dispatcher::{Dispatcher, DispatcherBuilder, DispatcherHandle, ShutdownReport};
pub use error::{DispatchError, TrySubmitError};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use pacer::Pacer;
pub use queue::{QueueError, RequestQueue};
pub use transports::{HttpTransport, LogTransport};
