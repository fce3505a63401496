//! 批次运行指标
//!
//! 原子计数器，可在任何线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 批次运行指标
#[derive(Debug, Default)]
pub struct BatchMetrics {
    /// 读周期总数（包括设备离线时的失效周期）
    pub read_cycles: AtomicU64,

    /// 传输层读取失败次数
    pub read_errors: AtomicU64,

    /// 设备离线导致的失效周期数
    pub invalidations: AtomicU64,

    /// 实际发出写命令（或尝试发出）的写周期数；空周期不计
    pub write_cycles: AtomicU64,

    /// 写失败次数（含设备离线）
    pub write_errors: AtomicU64,

    /// 待写值被覆盖的次数
    ///
    /// 快速增长说明写入频率高于写周期，中间值被合并掉了。
    pub writes_coalesced: AtomicU64,

    /// 已触发的事件总数
    pub events_fired: AtomicU64,
}

impl BatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取所有计数器的快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            read_cycles: self.read_cycles.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            write_cycles: self.write_cycles.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            writes_coalesced: self.writes_coalesced.load(Ordering::Relaxed),
            events_fired: self.events_fired.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.read_cycles.store(0, Ordering::Relaxed);
        self.read_errors.store(0, Ordering::Relaxed);
        self.invalidations.store(0, Ordering::Relaxed);
        self.write_cycles.store(0, Ordering::Relaxed);
        self.write_errors.store(0, Ordering::Relaxed);
        self.writes_coalesced.store(0, Ordering::Relaxed);
        self.events_fired.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub read_cycles: u64,
    pub read_errors: u64,
    pub invalidations: u64,
    pub write_cycles: u64,
    pub write_errors: u64,
    pub writes_coalesced: u64,
    pub events_fired: u64,
}

impl MetricsSnapshot {
    /// 读失败率（百分比，含失效周期）；没有读周期时为 0
    pub fn read_failure_rate(&self) -> f64 {
        if self.read_cycles == 0 {
            return 0.0;
        }
        ((self.read_errors + self.invalidations) as f64 / self.read_cycles as f64) * 100.0
    }

    /// 写失败率（百分比）；没有写周期时为 0
    pub fn write_failure_rate(&self) -> f64 {
        if self.write_cycles == 0 {
            return 0.0;
        }
        (self.write_errors as f64 / self.write_cycles as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_metrics_default() {
        let snapshot = BatchMetrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
        assert_eq!(snapshot.read_failure_rate(), 0.0);
    }

    #[test]
    fn test_rates() {
        let metrics = BatchMetrics::new();
        metrics.read_cycles.fetch_add(10, Ordering::Relaxed);
        metrics.read_errors.fetch_add(1, Ordering::Relaxed);
        metrics.invalidations.fetch_add(1, Ordering::Relaxed);
        metrics.write_cycles.fetch_add(4, Ordering::Relaxed);
        metrics.write_errors.fetch_add(1, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert!((snapshot.read_failure_rate() - 20.0).abs() < 1e-9);
        assert!((snapshot.write_failure_rate() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset() {
        let metrics = BatchMetrics::new();
        metrics.events_fired.fetch_add(3, Ordering::Relaxed);
        metrics.reset();
        assert_eq!(metrics.snapshot().events_fired, 0);
    }

    #[test]
    fn test_concurrent_updates() {
        let metrics = Arc::new(BatchMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        m.writes_coalesced.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().writes_coalesced, 800);
    }
}
