//! 传输层抽象
//!
//! 引擎只通过 [`IoTransport`] 与设备交互，不解释载荷字节。
//! 读周期与写周期可能在不同线程中并发调用同一个传输层实例，
//! 因此方法都接收 `&self`，内部同步由实现负责。

use pollbatch_protocol::{IoError, ReadCommand, WriteCommand};
use std::sync::Arc;

/// 设备传输层
///
/// 调用是同步的：返回时读命令的载荷已填充完毕，或写命令已发送完毕。
/// 重试、退避、超时都属于传输层自身的职责，批次不会重试。
pub trait IoTransport: Send + Sync {
    /// 设备当前是否处于可通信状态
    ///
    /// 返回 `false` 时批次不会调用 `read`/`write`，而是直接以
    /// [`IoError::NotConnected`] 更新状态。
    fn is_operational(&self) -> bool;

    /// 执行读命令，把响应填入 `command.payload_mut()`
    fn read(&self, command: &mut ReadCommand) -> Result<(), IoError>;

    /// 执行写命令
    fn write(&self, command: &WriteCommand) -> Result<(), IoError>;
}

impl<T: IoTransport + ?Sized> IoTransport for Arc<T> {
    fn is_operational(&self) -> bool {
        (**self).is_operational()
    }

    fn read(&self, command: &mut ReadCommand) -> Result<(), IoError> {
        (**self).read(command)
    }

    fn write(&self, command: &WriteCommand) -> Result<(), IoError> {
        (**self).write(command)
    }
}

impl<T: IoTransport + ?Sized> IoTransport for Box<T> {
    fn is_operational(&self) -> bool {
        (**self).is_operational()
    }

    fn read(&self, command: &mut ReadCommand) -> Result<(), IoError> {
        (**self).read(command)
    }

    fn write(&self, command: &WriteCommand) -> Result<(), IoError> {
        (**self).write(command)
    }
}
