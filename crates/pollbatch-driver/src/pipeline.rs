//! Pipeline IO 循环模块
//!
//! 负责周期性地驱动批次：
//!
//! - [`read_loop`]：固定周期执行读周期（`spin_sleep` 提供亚毫秒级精度）
//! - [`write_loop`]：输出写入时立即唤醒，否则按写周期兜底执行
//!
//! 两个循环都通过 `is_running` 标志退出，由 [`BatchRunner`](crate::BatchRunner) 管理。

use crate::batch::IoBatch;
use crate::transport::IoTransport;
use crossbeam_channel::RecvTimeoutError;
use pollbatch_protocol::Timestamp;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// 检查退出标志的最长间隔
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Pipeline 配置
///
/// # Example
///
/// ```
/// use pollbatch_driver::PipelineConfig;
///
/// // 使用默认配置（读写都是 100ms）
/// let config = PipelineConfig::default();
///
/// // 快速轮询
/// let config = PipelineConfig {
///     read_interval_ms: 10,
///     write_interval_ms: 50,
/// };
/// assert_eq!(config.read_interval().as_millis(), 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 读周期（毫秒）
    pub read_interval_ms: u64,
    /// 写周期（毫秒）
    ///
    /// 输出写入会立即唤醒写线程，这个周期只是没有唤醒时的兜底。
    pub write_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            read_interval_ms: 100,
            write_interval_ms: 100,
        }
    }
}

impl PipelineConfig {
    pub fn read_interval(&self) -> Duration {
        Duration::from_millis(self.read_interval_ms.max(1))
    }

    pub fn write_interval(&self) -> Duration {
        Duration::from_millis(self.write_interval_ms.max(1))
    }
}

#[cfg(feature = "realtime")]
fn raise_thread_priority(role: &str) {
    use thread_priority::*;
    use tracing::info;

    match set_current_thread_priority(ThreadPriority::Max) {
        Ok(_) => {
            info!("{} thread priority set to MAX (realtime)", role);
        },
        Err(e) => {
            warn!(
                "Failed to set {} thread priority: {}. \
                On Linux, you may need to run with CAP_SYS_NICE or use rtkit.",
                role, e
            );
        },
    }
}

/// 睡到 `deadline`；期间收到停止信号返回 `false`
fn sleep_until(deadline: Instant, is_running: &AtomicBool) -> bool {
    loop {
        if !is_running.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        spin_sleep::sleep((deadline - now).min(STOP_POLL_INTERVAL));
    }
}

/// 读循环
///
/// 周期起点按固定节拍推进；某个周期超时后从当前时刻重新对齐，不追赶。
pub fn read_loop<D: IoTransport>(batch: Arc<IoBatch<D>>, config: PipelineConfig, is_running: Arc<AtomicBool>) {
    #[cfg(feature = "realtime")]
    raise_thread_priority("Read");

    let period = config.read_interval();
    let mut next = Instant::now();

    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("Batch {}: read loop stopping", batch.name());
            break;
        }

        batch.read(Timestamp::now());

        next += period;
        let now = Instant::now();
        if next < now {
            warn!(
                "Batch {}: read cycle overran its period by {:?}",
                batch.name(),
                now - next
            );
            next = now;
        }
        if !sleep_until(next, &is_running) {
            trace!("Batch {}: read loop stopping", batch.name());
            break;
        }
    }
}

/// 写循环
///
/// 等待写触发（输出写入或 [`IoBatch::trigger_write`]）或写周期超时，然后执行写周期。
/// 没有待写值的写周期是空操作。
pub fn write_loop<D: IoTransport>(batch: Arc<IoBatch<D>>, config: PipelineConfig, is_running: Arc<AtomicBool>) {
    #[cfg(feature = "realtime")]
    raise_thread_priority("Write");

    let period = config.write_interval();
    let trigger = batch.write_trigger().clone();

    loop {
        if !is_running.load(Ordering::Acquire) {
            break;
        }

        match trigger.recv_timeout(period) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {},
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Batch {}: write trigger disconnected", batch.name());
                break;
            },
        }

        if !is_running.load(Ordering::Acquire) {
            break;
        }
        batch.write(Timestamp::now());
    }
    trace!("Batch {}: write loop stopped", batch.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::IoBatchBuilder;
    use crate::mock::MockTransport;
    use std::thread;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.read_interval(), Duration::from_millis(100));
        assert_eq!(config.write_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = PipelineConfig {
            read_interval_ms: 0,
            write_interval_ms: 0,
        };
        assert_eq!(config.read_interval(), Duration::from_millis(1));
        assert_eq!(config.write_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_sleep_until_stops_early() {
        let is_running = AtomicBool::new(false);
        let start = Instant::now();
        assert!(!sleep_until(start + Duration::from_secs(5), &is_running));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_read_loop_runs_until_stopped() {
        let mut builder = IoBatchBuilder::new("loop");
        builder.add_input::<u16>("a", 0).unwrap();
        let transport = Arc::new(MockTransport::new(2));
        let batch = Arc::new(builder.build(Arc::clone(&transport)));
        let is_running = Arc::new(AtomicBool::new(true));

        let handle = {
            let batch = Arc::clone(&batch);
            let is_running = Arc::clone(&is_running);
            let config = PipelineConfig {
                read_interval_ms: 5,
                write_interval_ms: 5,
            };
            thread::spawn(move || read_loop(batch, config, is_running))
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while transport.read_calls() < 3 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        is_running.store(false, Ordering::Release);
        handle.join().unwrap();

        assert!(transport.read_calls() >= 3);
        assert!(batch.common_state().quality.is_good());
    }

    #[test]
    fn test_write_loop_wakes_on_write() {
        let mut builder = IoBatchBuilder::new("loop");
        let output = builder.add_output::<u16>("out", 0).unwrap();
        let transport = Arc::new(MockTransport::new(2));
        let batch = Arc::new(builder.build(Arc::clone(&transport)));
        let is_running = Arc::new(AtomicBool::new(true));

        let handle = {
            let batch = Arc::clone(&batch);
            let is_running = Arc::clone(&is_running);
            // 兜底周期很长，写入必须靠触发唤醒
            let config = PipelineConfig {
                read_interval_ms: 100,
                write_interval_ms: 60_000,
            };
            thread::spawn(move || write_loop(batch, config, is_running))
        };

        output.write_value(7);
        let deadline = Instant::now() + Duration::from_secs(5);
        while transport.write_calls() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        is_running.store(false, Ordering::Release);
        batch.trigger_write();
        handle.join().unwrap();

        assert_eq!(transport.write_calls(), 1);
        assert_eq!(transport.value::<u16>(0), Ok(7));
    }
}
