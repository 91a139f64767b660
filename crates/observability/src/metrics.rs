//! 路由指标收集模块
//!
//! 收集和统计路由引擎的运行指标。

use contracts::FailureKind;
use metrics::{counter, gauge, histogram};

/// 记录一次完整走完行程的分发
pub fn record_dispatch_completed(steps_sent: usize, steps_skipped: usize) {
    counter!("routing_slip_dispatches_total", "status" => "success").increment(1);
    histogram!("routing_slip_steps_per_dispatch").record(steps_sent as f64);
    if steps_skipped > 0 {
        counter!("routing_slip_steps_skipped_total").increment(steps_skipped as u64);
    }
}

/// 记录一次终止于失败的分发
pub fn record_dispatch_failed(kind: FailureKind) {
    counter!("routing_slip_dispatches_total", "status" => "failure").increment(1);
    counter!(
        "routing_slip_dispatch_failures_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// 记录单步跳过 (invalid destination 策略)
pub fn record_step_skipped(uri: &str) {
    counter!(
        "routing_slip_step_skips_total",
        "uri" => uri.to_string()
    )
    .increment(1);
}

/// 记录生产者缓存当前条目数
pub fn record_cache_entries(entries: usize) {
    gauge!("routing_slip_cache_entries").set(entries as f64);
}

/// 分发指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct DispatchStatsAggregator {
    /// 总分发数
    pub total_dispatches: u64,

    /// 成功分发数
    pub total_succeeded: u64,

    /// 失败分发数
    pub total_failed: u64,

    /// 跳过步数总计
    pub total_skipped: u64,

    /// 每次分发步数统计
    pub steps_stats: RunningStats,

    /// 单步延迟统计 (毫秒)
    pub latency_stats: RunningStats,

    /// 按失败类别计数
    pub failure_counts: std::collections::HashMap<&'static str, u64>,

    /// 各目的地跳过次数
    pub skip_counts: std::collections::HashMap<String, u64>,
}

impl DispatchStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次成功分发
    pub fn record_success(&mut self, steps_sent: usize, skipped: &[String]) {
        self.total_dispatches += 1;
        self.total_succeeded += 1;
        self.total_skipped += skipped.len() as u64;
        self.steps_stats.push(steps_sent as f64);
        for uri in skipped {
            *self.skip_counts.entry(uri.clone()).or_insert(0) += 1;
        }
    }

    /// 记录一次失败分发
    pub fn record_failure(&mut self, kind: FailureKind, steps_sent: usize) {
        self.total_dispatches += 1;
        self.total_failed += 1;
        self.steps_stats.push(steps_sent as f64);
        *self.failure_counts.entry(kind.as_str()).or_insert(0) += 1;
    }

    /// 记录单步延迟
    pub fn record_latency_ms(&mut self, latency_ms: f64) {
        self.latency_stats.push(latency_ms);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_dispatches: self.total_dispatches,
            total_succeeded: self.total_succeeded,
            total_failed: self.total_failed,
            total_skipped: self.total_skipped,
            failure_rate: if self.total_dispatches > 0 {
                self.total_failed as f64 / self.total_dispatches as f64 * 100.0
            } else {
                0.0
            },
            steps_per_dispatch: StatsSummary::from(&self.steps_stats),
            step_latency_ms: StatsSummary::from(&self.latency_stats),
            failure_counts: self.failure_counts.clone(),
            skip_counts: self.skip_counts.clone(),
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
    pub total_dispatches: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub total_skipped: u64,
    pub failure_rate: f64,
    pub steps_per_dispatch: StatsSummary,
    pub step_latency_ms: StatsSummary,
    pub failure_counts: std::collections::HashMap<&'static str, u64>,
    pub skip_counts: std::collections::HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Metrics Summary ===")?;
        writeln!(f, "Total dispatches: {}", self.total_dispatches)?;
        writeln!(f, "Succeeded: {}", self.total_succeeded)?;
        writeln!(
            f,
            "Failed: {} ({:.2}%)",
            self.total_failed, self.failure_rate
        )?;
        writeln!(f, "Steps skipped: {}", self.total_skipped)?;
        writeln!(f, "Steps per dispatch: {}", self.steps_per_dispatch)?;
        writeln!(f, "Step latency (ms): {}", self.step_latency_ms)?;

        if !self.failure_counts.is_empty() {
            writeln!(f, "Failure counts:")?;
            for (kind, count) in &self.failure_counts {
                writeln!(f, "  {}: {}", kind, count)?;
            }
        }
        if !self.skip_counts.is_empty() {
            writeln!(f, "Skipped destination counts:")?;
            for (uri, count) in &self.skip_counts {
                writeln!(f, "  {}: {}", uri, count)?;
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
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
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
