//! Mock 传输层
//!
//! 用内存中的"设备映像"模拟一台设备：读命令按区间跨度复制映像，
//! 写命令把片段写回映像，因此回读输出可以看到自己写出的值。
//! 仅在测试或启用 `mock` feature 时编译。

use crate::transport::IoTransport;
use parking_lot::Mutex;
use pollbatch_protocol::{IoError, PointValue, ReadCommand, WriteCommand, WriteFragment};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// 内存设备
#[derive(Debug)]
pub struct MockTransport {
    operational: AtomicBool,
    image: Mutex<Vec<u8>>,
    read_failure: Mutex<Option<IoError>>,
    write_failure: Mutex<Option<IoError>>,
    writes: Mutex<Vec<Vec<WriteFragment>>>,
    read_calls: AtomicUsize,
    write_calls: AtomicUsize,
}

impl MockTransport {
    /// 创建一台在线设备，映像为 `image_len` 个零字节
    pub fn new(image_len: usize) -> Self {
        Self {
            operational: AtomicBool::new(true),
            image: Mutex::new(vec![0; image_len]),
            read_failure: Mutex::new(None),
            write_failure: Mutex::new(None),
            writes: Mutex::new(Vec::new()),
            read_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_operational(&self, operational: bool) {
        self.operational.store(operational, Ordering::Release);
    }

    /// 在映像中写入一个点值（大端）
    ///
    /// # Panics
    ///
    /// 超出映像长度。
    pub fn set_value<T: PointValue>(&self, offset: u32, value: &T) {
        let start = offset as usize;
        let mut image = self.image.lock();
        value.encode(&mut image[start..start + T::WIDTH]);
    }

    /// 直接覆盖映像中的原始字节
    pub fn set_bytes(&self, offset: u32, bytes: &[u8]) {
        let start = offset as usize;
        self.image.lock()[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// 截断或扩展映像（用于模拟短载荷）
    pub fn resize(&self, len: usize) {
        self.image.lock().resize(len, 0);
    }

    /// 读取映像中的一个点值
    pub fn value<T: PointValue>(&self, offset: u32) -> Result<T, IoError> {
        T::decode_at(&self.image.lock(), offset)
    }

    /// 让后续读命令失败（`None` 恢复正常）
    pub fn fail_reads(&self, error: Option<IoError>) {
        *self.read_failure.lock() = error;
    }

    /// 让后续写命令失败（`None` 恢复正常）
    pub fn fail_writes(&self, error: Option<IoError>) {
        *self.write_failure.lock() = error;
    }

    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::Relaxed)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::Relaxed)
    }

    /// 所有写命令的片段（按调用顺序）
    pub fn written(&self) -> Vec<Vec<WriteFragment>> {
        self.writes.lock().clone()
    }

    pub fn last_write(&self) -> Option<Vec<WriteFragment>> {
        self.writes.lock().last().cloned()
    }
}

impl IoTransport for MockTransport {
    fn is_operational(&self) -> bool {
        self.operational.load(Ordering::Acquire)
    }

    fn read(&self, command: &mut ReadCommand) -> Result<(), IoError> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = *self.read_failure.lock() {
            return Err(error);
        }
        let image = self.image.lock();
        let len = image.len().min(command.span() as usize);
        command.payload_mut().fill_from_slice(&image[..len]);
        Ok(())
    }

    fn write(&self, command: &WriteCommand) -> Result<(), IoError> {
        self.write_calls.fetch_add(1, Ordering::Relaxed);
        self.writes.lock().push(command.fragments().to_vec());
        if let Some(error) = *self.write_failure.lock() {
            return Err(error);
        }
        let mut image = self.image.lock();
        for fragment in command.fragments() {
            let start = fragment.offset as usize;
            let bytes = fragment.as_bytes();
            let end = (start + bytes.len()).min(image.len());
            if start < end {
                image[start..end].copy_from_slice(&bytes[..end - start]);
            }
        }
        Ok(())
    }
}
