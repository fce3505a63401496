//! 批次运行器
//!
//! 为一个批次启动读线程和写线程，Drop 时通知线程退出并等待。

use crate::batch::IoBatch;
use crate::error::DriverError;
use crate::pipeline::{PipelineConfig, read_loop, write_loop};
use crate::transport::IoTransport;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, spawn};
use std::time::Duration;
use tracing::{error, info};

/// 等待线程退出的上限
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();
        // 看门狗线程代为 join，超时后自行结束
        spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 批次运行器
///
/// # Example
///
/// ```no_run
/// use pollbatch_driver::{BatchRunner, IoBatchBuilder, PipelineConfig};
/// # use pollbatch_driver::IoTransport;
/// # use pollbatch_protocol::{IoError, ReadCommand, WriteCommand};
/// # struct Device;
/// # impl IoTransport for Device {
/// #     fn is_operational(&self) -> bool { true }
/// #     fn read(&self, _: &mut ReadCommand) -> Result<(), IoError> { Ok(()) }
/// #     fn write(&self, _: &WriteCommand) -> Result<(), IoError> { Ok(()) }
/// # }
/// # fn transport() -> Device { Device }
/// use std::sync::Arc;
///
/// let mut builder = IoBatchBuilder::new("plc");
/// let temperature = builder.add_input::<f32>("temperature", 0).unwrap();
/// let batch = Arc::new(builder.build(transport()));
///
/// let runner = BatchRunner::start(batch, PipelineConfig::default()).unwrap();
/// std::thread::sleep(std::time::Duration::from_secs(1));
/// println!("temperature = {}", temperature.value());
/// runner.stop().unwrap();
/// ```
pub struct BatchRunner<D: IoTransport + 'static> {
    batch: Arc<IoBatch<D>>,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
    read_thread: Option<JoinHandle<()>>,
    write_thread: Option<JoinHandle<()>>,
}

impl<D: IoTransport + 'static> BatchRunner<D> {
    /// 启动读写线程
    pub fn start(batch: Arc<IoBatch<D>>, config: PipelineConfig) -> Result<Self, DriverError> {
        let is_running = Arc::new(AtomicBool::new(true));

        let read_thread = {
            let batch = Arc::clone(&batch);
            let is_running = Arc::clone(&is_running);
            thread::Builder::new()
                .name(format!("{}-read", batch.name()))
                .spawn(move || read_loop(batch, config, is_running))
                .map_err(|e| DriverError::IoThread(format!("failed to spawn read thread: {}", e)))?
        };

        let mut runner = Self {
            batch,
            config,
            is_running,
            read_thread: Some(read_thread),
            write_thread: None,
        };

        // 写线程启动失败时，runner 的 Drop 会停掉已启动的读线程
        let write_thread = {
            let batch = Arc::clone(&runner.batch);
            let is_running = Arc::clone(&runner.is_running);
            thread::Builder::new()
                .name(format!("{}-write", batch.name()))
                .spawn(move || write_loop(batch, config, is_running))
                .map_err(|e| DriverError::IoThread(format!("failed to spawn write thread: {}", e)))?
        };
        runner.write_thread = Some(write_thread);

        info!(
            "Batch {}: runner started (read every {:?}, write every {:?})",
            runner.batch.name(),
            config.read_interval(),
            config.write_interval()
        );
        Ok(runner)
    }

    pub fn batch(&self) -> &Arc<IoBatch<D>> {
        &self.batch
    }

    pub fn config(&self) -> PipelineConfig {
        self.config
    }

    /// 线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// 停止并等待线程退出
    pub fn stop(mut self) -> Result<(), DriverError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), DriverError> {
        if self.read_thread.is_none() && self.write_thread.is_none() {
            return Ok(());
        }

        self.is_running.store(false, Ordering::Release);
        // 唤醒阻塞在写触发上的写线程
        self.batch.trigger_write();

        let mut failed = Vec::new();
        if let Some(handle) = self.read_thread.take()
            && handle.join_timeout(JOIN_TIMEOUT).is_err()
        {
            error!(
                "Batch {}: read thread panicked or failed to shut down within {:?}",
                self.batch.name(),
                JOIN_TIMEOUT
            );
            failed.push("read");
        }
        if let Some(handle) = self.write_thread.take()
            && handle.join_timeout(JOIN_TIMEOUT).is_err()
        {
            error!(
                "Batch {}: write thread panicked or failed to shut down within {:?}",
                self.batch.name(),
                JOIN_TIMEOUT
            );
            failed.push("write");
        }

        info!("Batch {}: runner stopped", self.batch.name());
        if failed.is_empty() {
            Ok(())
        } else {
            Err(DriverError::IoThread(format!(
                "{} thread(s) did not shut down cleanly",
                failed.join(", ")
            )))
        }
    }
}

impl<D: IoTransport + 'static> Drop for BatchRunner<D> {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
