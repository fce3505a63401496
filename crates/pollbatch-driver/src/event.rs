//! 事件系统
//!
//! 状态跟踪器在配置阶段向批次的 [`EventTable`] 注册事件，得到一个 [`EventId`]
//! （表内下标）。事件只保存指向所属点名称的非拥有引用，不与点共享所有权。
//!
//! # 触发流程
//!
//! ```text
//! update(...)  → PendingEventList.push(id)   （事务内，只记录下标）
//! commit()     → 新快照对读者可见
//! fire_all()   → 按收集顺序调用订阅者与全局钩子
//! ```
//!
//! # 回调要求
//!
//! 回调在读/写周期线程中同步执行：
//! - **非阻塞**：禁止 I/O、长时间持锁
//! - **Channel 模式**：推荐用 `crossbeam_channel::Sender::try_send` 转交给其他线程，
//!   参见 [`EventRecorder`]

use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use pollbatch_protocol::Timestamp;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// 读周期完成（每个读周期都触发）
pub const READ_EVENT: &str = "read";
/// 质量变化
pub const QUALITY_EVENT: &str = "quality";
/// 点值变化
pub const VALUE_EVENT: &str = "value";
/// 点的任意状态变化（值或批次质量/错误）
pub const CHANGED_EVENT: &str = "changed";
/// 写出成功
pub const WRITTEN_EVENT: &str = "written";
/// 写出失败
pub const WRITE_ERROR_EVENT: &str = "writeError";

/// 事件标识（批次事件表内的下标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u32);

impl EventId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// 一次已触发的事件
#[derive(Debug, Clone, Copy)]
pub struct FiredEvent<'a> {
    pub id: EventId,
    /// 事件名称（如 `"changed"`）
    pub name: &'static str,
    /// 所属对象（批次或点）的名称
    pub owner: &'a Arc<str>,
    /// 触发该事件的周期时间戳
    pub timestamp: Timestamp,
}

/// 事件回调
///
/// 在提交之后、同一周期线程中调用，必须尽快返回。
pub trait EventCallback: Send + Sync {
    fn on_event(&self, event: &FiredEvent<'_>);
}

type Subscribers = ArcSwap<Vec<Arc<dyn EventCallback>>>;

struct EventSlot {
    name: &'static str,
    owner: Arc<str>,
    subscribers: Subscribers,
}

impl EventSlot {
    fn new(owner: &Arc<str>, name: &'static str) -> Self {
        Self {
            name,
            owner: Arc::clone(owner),
            subscribers: ArcSwap::from_pointee(Vec::new()),
        }
    }
}

fn push_subscriber(list: &Subscribers, callback: Arc<dyn EventCallback>) {
    list.rcu(|current| {
        let mut next = Vec::clone(current);
        next.push(Arc::clone(&callback));
        next
    });
}

/// 批次事件表
///
/// 注册只允许在 [`seal`](Self::seal) 之前进行；订阅、触发只允许在之后进行。
/// 订阅列表使用 `ArcSwap`，触发路径只做原子加载，不加锁、不分配。
pub struct EventTable {
    pending: Mutex<Vec<EventSlot>>,
    slots: OnceLock<Box<[EventSlot]>>,
    hooks: Subscribers,
}

impl EventTable {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            slots: OnceLock::new(),
            hooks: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// 注册一个事件
    ///
    /// # Panics
    ///
    /// 事件表已经封闭。
    pub fn register(&self, owner: &Arc<str>, name: &'static str) -> EventId {
        assert!(
            !self.is_sealed(),
            "cannot register event `{}` of `{}` after the event table was sealed",
            name,
            owner
        );
        let mut pending = self.pending.lock();
        let id = EventId(pending.len() as u32);
        pending.push(EventSlot::new(owner, name));
        id
    }

    /// 封闭事件表
    ///
    /// # Panics
    ///
    /// 重复封闭。
    pub fn seal(&self) {
        let slots = std::mem::take(&mut *self.pending.lock()).into_boxed_slice();
        if self.slots.set(slots).is_err() {
            panic!("event table sealed twice");
        }
    }

    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.slots.get().is_some()
    }

    /// 已注册的事件数量
    pub fn len(&self) -> usize {
        match self.slots.get() {
            Some(slots) => slots.len(),
            None => self.pending.lock().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slots(&self) -> &[EventSlot] {
        self.slots
            .get()
            .map(|slots| &slots[..])
            .unwrap_or_else(|| panic!("event table used before it was sealed"))
    }

    fn slot(&self, id: EventId) -> &EventSlot {
        &self.slots()[id.index()]
    }

    /// 事件名称
    pub fn name(&self, id: EventId) -> &'static str {
        self.slot(id).name
    }

    /// 事件所属对象名称
    pub fn owner(&self, id: EventId) -> &str {
        &self.slot(id).owner
    }

    /// 订阅单个事件
    pub fn subscribe(&self, id: EventId, callback: Arc<dyn EventCallback>) {
        push_subscriber(&self.slot(id).subscribers, callback);
    }

    /// 添加全局钩子（接收本表的所有事件）
    pub fn add_hook(&self, callback: Arc<dyn EventCallback>) {
        push_subscriber(&self.hooks, callback);
    }

    /// 移除所有订阅者和钩子
    pub fn clear_subscribers(&self) {
        for slot in self.slots() {
            slot.subscribers.store(Arc::new(Vec::new()));
        }
        self.hooks.store(Arc::new(Vec::new()));
    }

    /// 触发单个事件
    pub fn fire(&self, id: EventId, timestamp: Timestamp) {
        let slot = self.slot(id);
        let event = FiredEvent {
            id,
            name: slot.name,
            owner: &slot.owner,
            timestamp,
        };
        for callback in slot.subscribers.load().iter() {
            callback.on_event(&event);
        }
        for callback in self.hooks.load().iter() {
            callback.on_event(&event);
        }
    }

    /// 按收集顺序触发一个周期内的所有事件
    pub fn fire_all(&self, events: &PendingEventList, timestamp: Timestamp) {
        for &id in events.iter() {
            self.fire(id, timestamp);
        }
    }
}

impl Default for EventTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTable")
            .field("sealed", &self.is_sealed())
            .field("len", &self.len())
            .finish()
    }
}

/// 一个周期内待触发的事件列表
///
/// 容量在批次构建时按事件总数预分配，周期内 `push` 不会触发堆分配。
#[derive(Debug, Default)]
pub struct PendingEventList {
    events: Vec<EventId>,
}

impl PendingEventList {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn push(&mut self, id: EventId) {
        debug_assert!(
            self.events.len() < self.events.capacity(),
            "pending event list capacity exceeded"
        );
        self.events.push(id);
    }

    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, EventId> {
        self.events.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[EventId] {
        &self.events
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn contains(&self, id: EventId) -> bool {
        self.events.contains(&id)
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }
}

/// 录制下来的事件（拥有所属对象名称的引用计数）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub id: EventId,
    pub name: &'static str,
    pub owner: Arc<str>,
    pub timestamp: Timestamp,
}

impl From<&FiredEvent<'_>> for RecordedEvent {
    fn from(event: &FiredEvent<'_>) -> Self {
        Self {
            id: event.id,
            name: event.name,
            owner: Arc::clone(event.owner),
            timestamp: event.timestamp,
        }
    }
}

/// 基于有界 Channel 的事件录制钩子
///
/// 队列满时丢弃事件（`try_send`），并累加 `dropped_events` 计数。
pub struct EventRecorder {
    tx: Sender<RecordedEvent>,
    dropped_events: Arc<AtomicU64>,
    recorded_events: Arc<AtomicU64>,
}

impl EventRecorder {
    /// 默认队列容量
    pub const DEFAULT_CAPACITY: usize = 10_000;

    #[must_use]
    pub fn new() -> (Self, Receiver<RecordedEvent>) {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> (Self, Receiver<RecordedEvent>) {
        let (tx, rx) = bounded(capacity);
        let recorder = Self {
            tx,
            dropped_events: Arc::new(AtomicU64::new(0)),
            recorded_events: Arc::new(AtomicU64::new(0)),
        };
        (recorder, rx)
    }

    pub fn dropped_events(&self) -> &Arc<AtomicU64> {
        &self.dropped_events
    }

    pub fn recorded_events(&self) -> &Arc<AtomicU64> {
        &self.recorded_events
    }
}

impl EventCallback for EventRecorder {
    fn on_event(&self, event: &FiredEvent<'_>) {
        if self.tx.try_send(RecordedEvent::from(event)).is_err() {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        } else {
            self.recorded_events.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner(name: &str) -> Arc<str> {
        Arc::from(name)
    }

    #[test]
    fn test_register_and_seal() {
        let table = EventTable::new();
        let batch = owner("batch");
        let read = table.register(&batch, READ_EVENT);
        let quality = table.register(&batch, QUALITY_EVENT);
        table.seal();

        assert_eq!(table.len(), 2);
        assert_ne!(read, quality);
        assert_eq!(table.name(quality), "quality");
        assert_eq!(table.owner(read), "batch");
    }

    #[test]
    #[should_panic(expected = "after the event table was sealed")]
    fn test_register_after_seal_panics() {
        let table = EventTable::new();
        table.seal();
        table.register(&owner("late"), CHANGED_EVENT);
    }

    #[test]
    #[should_panic(expected = "before it was sealed")]
    fn test_subscribe_before_seal_panics() {
        let table = EventTable::new();
        let id = table.register(&owner("p"), VALUE_EVENT);
        let (recorder, _rx) = EventRecorder::new();
        table.subscribe(id, Arc::new(recorder));
    }

    #[test]
    fn test_fire_reaches_subscribers_and_hooks_in_order() {
        let table = EventTable::new();
        let p = owner("p");
        let value = table.register(&p, VALUE_EVENT);
        let changed = table.register(&p, CHANGED_EVENT);
        table.seal();

        let (only_value, value_rx) = EventRecorder::new();
        table.subscribe(value, Arc::new(only_value));
        let (all, all_rx) = EventRecorder::new();
        table.add_hook(Arc::new(all));

        let mut pending = PendingEventList::with_capacity(table.len());
        pending.push(value);
        pending.push(changed);
        table.fire_all(&pending, Timestamp::from_micros(5));

        let names: Vec<_> = all_rx.try_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["value", "changed"]);

        let got: Vec<_> = value_rx.try_iter().collect();
        assert_eq!(got.len(), 1);
        assert_eq!(&*got[0].owner, "p");
        assert_eq!(got[0].timestamp, Timestamp::from_micros(5));
    }

    #[test]
    fn test_recorder_counts_drops() {
        let table = EventTable::new();
        let id = table.register(&owner("p"), WRITTEN_EVENT);
        table.seal();

        let (recorder, rx) = EventRecorder::with_capacity(1);
        let dropped = Arc::clone(recorder.dropped_events());
        table.add_hook(Arc::new(recorder));

        table.fire(id, Timestamp::from_micros(1));
        table.fire(id, Timestamp::from_micros(2));

        assert_eq!(rx.len(), 1);
        assert_eq!(dropped.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_clear_subscribers() {
        let table = EventTable::new();
        let id = table.register(&owner("p"), WRITTEN_EVENT);
        table.seal();

        let (recorder, rx) = EventRecorder::new();
        table.subscribe(id, Arc::new(recorder));
        table.clear_subscribers();
        table.fire(id, Timestamp::from_micros(1));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_pending_list_reuse_keeps_capacity() {
        let mut pending = PendingEventList::with_capacity(4);
        pending.push(EventId(0));
        pending.push(EventId(3));
        assert!(pending.contains(EventId(3)));
        pending.clear();
        assert!(pending.is_empty());
        assert_eq!(pending.capacity(), 4);
    }
}
