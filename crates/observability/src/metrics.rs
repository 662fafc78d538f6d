//! Dispatcher 指标收集模块
//!
//! 基于 DeliveryReport 收集和统计文档投递的运行指标。

use std::collections::HashMap;

use contracts::{DeliveryError, DeliveryReport};
use metrics::{counter, gauge, histogram};

/// 从 DeliveryReport 记录指标
///
/// 每次投递尝试结束时调用此函数来记录指标。
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_delivery;
///
/// while let Some(report) = reports.recv().await {
///     record_delivery(&report);
/// }
/// ```
pub fn record_delivery(report: &DeliveryReport) {
    let status = match &report.outcome {
        Ok(_) => "success",
        Err(e) => e.kind(),
    };
    counter!("crpt_dispatch_deliveries_total", "status" => status).increment(1);

    if report.attempt > 1 {
        counter!("crpt_dispatch_retries_total").increment(1);
    }

    // 排队等待时间
    histogram!("crpt_dispatch_queue_wait_ms").record(report.queue_wait.as_secs_f64() * 1000.0);

    record_delivery_latency_ms(report.latency.as_secs_f64() * 1000.0);

    if let Ok(response) = &report.outcome {
        gauge!("crpt_dispatch_last_status").set(f64::from(response.status));
    }
}

/// 记录文档提交
pub fn record_submission(accepted: bool) {
    let status = if accepted { "accepted" } else { "rejected" };
    counter!("crpt_dispatch_submissions_total", "status" => status).increment(1);
}

/// 记录传输耗时
pub fn record_delivery_latency_ms(latency_ms: f64) {
    histogram!("crpt_dispatch_delivery_latency_ms").record(latency_ms);
}

/// 记录队列深度
pub fn record_queue_depth(depth: usize) {
    gauge!("crpt_dispatch_queue_depth").set(depth as f64);
}

/// 记录关闭时丢弃的文档
pub fn record_discarded(count: u64) {
    if count > 0 {
        counter!("crpt_dispatch_discarded_total").increment(count);
    }
}

/// 投递指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DeliveryStatsAggregator {
    /// 投递尝试总数
    pub total_attempts: u64,

    /// 成功数
    pub delivered: u64,

    /// 失败数
    pub failed: u64,

    /// 重试尝试数 (attempt > 1)
    pub retries: u64,

    /// 传输耗时统计 (毫秒)
    pub latency_stats: RunningStats,

    /// 排队等待统计 (毫秒)
    pub queue_wait_stats: RunningStats,

    /// 各失败类型计数
    pub failure_counts: HashMap<&'static str, u64>,

    /// 各 HTTP 状态码计数
    pub status_counts: HashMap<u16, u64>,
}

impl DeliveryStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, report: &DeliveryReport) {
        self.total_attempts += 1;
        if report.attempt > 1 {
            self.retries += 1;
        }

        match &report.outcome {
            Ok(response) => {
                self.delivered += 1;
                *self.status_counts.entry(response.status).or_insert(0) += 1;
            }
            Err(e) => {
                self.failed += 1;
                *self.failure_counts.entry(e.kind()).or_insert(0) += 1;
                if let DeliveryError::Transport(contracts::TransportError::Rejected {
                    status, ..
                }) = e
                {
                    *self.status_counts.entry(*status).or_insert(0) += 1;
                }
            }
        }

        self.latency_stats
            .push(report.latency.as_secs_f64() * 1000.0);
        self.queue_wait_stats
            .push(report.queue_wait.as_secs_f64() * 1000.0);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_attempts: self.total_attempts,
            delivered: self.delivered,
            failed: self.failed,
            retries: self.retries,
            failure_rate: if self.total_attempts > 0 {
                self.failed as f64 / self.total_attempts as f64 * 100.0
            } else {
                0.0
            },
            latency_ms: StatsSummary::from(&self.latency_stats),
            queue_wait_ms: StatsSummary::from(&self.queue_wait_stats),
            failure_counts: self.failure_counts.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_attempts: u64,
    pub delivered: u64,
    pub failed: u64,
    pub retries: u64,
    pub failure_rate: f64,
    pub latency_ms: StatsSummary,
    pub queue_wait_ms: StatsSummary,
    pub failure_counts: HashMap<&'static str, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        writeln!(f, "Attempts: {}", self.total_attempts)?;
        writeln!(f, "Delivered: {}", self.delivered)?;
        writeln!(
            f,
            "Failed: {} ({:.2}%)",
            self.failed, self.failure_rate
        )?;
        writeln!(f, "Retries: {}", self.retries)?;
        writeln!(f, "Latency (ms): {}", self.latency_ms)?;
        writeln!(f, "Queue wait (ms): {}", self.queue_wait_ms)?;

        if !self.failure_counts.is_empty() {
            writeln!(f, "Failures by kind:")?;
            let mut kinds: Vec<_> = self.failure_counts.iter().collect();
            kinds.sort();
            for (kind, count) in kinds {
                writeln!(f, "  {}: {}", kind, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}
