//! 单槽待写队列（最新值优先）
//!
//! 生产者（属性写入）与写周期之间唯一的同步点：
//! - `enqueue`：任意线程调用，不阻塞、不分配，覆盖尚未消费的旧值
//! - `dequeue`：只由写周期调用，原子地取走并清空
//!
//! 写入比轮询快时不会积压，写周期只会看到最新的值。

use crossbeam_utils::atomic::AtomicCell;
use std::fmt;

/// 单槽队列
pub struct SingleValueQueue<T> {
    slot: AtomicCell<Option<T>>,
}

impl<T> SingleValueQueue<T> {
    pub const fn new() -> Self {
        Self {
            slot: AtomicCell::new(None),
        }
    }

    /// 放入一个值
    ///
    /// 返回 `true` 表示覆盖了一个尚未被写周期取走的旧值。
    #[inline]
    pub fn enqueue(&self, value: T) -> bool {
        self.slot.swap(Some(value)).is_some()
    }

    /// 取走待写的值
    #[inline]
    pub fn dequeue(&self) -> Option<T> {
        self.slot.swap(None)
    }

    /// 当前平台上该槽位是否由原生原子指令实现
    ///
    /// 为 `false` 时 `AtomicCell` 退化为全局分片自旋锁，仍不分配内存。
    pub fn is_lock_free() -> bool {
        AtomicCell::<Option<T>>::is_lock_free()
    }
}

impl<T> Default for SingleValueQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SingleValueQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleValueQueue")
            .field("lock_free", &Self::is_lock_free())
            .finish_non_exhaustive()
    }
}
