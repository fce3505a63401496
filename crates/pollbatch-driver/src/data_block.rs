//! 双缓冲数据块与写事务
//!
//! 数据块保存一个批次的所有状态记录。布局在配置阶段通过
//! [`DataBlock::append_object`] 逐条追加，[`DataBlock::realize`] 之后固定不变。
//!
//! # 双缓冲
//!
//! ```text
//! published (RwLock)  ← 读句柄、外部观察者只读这一份
//! scratch   (Mutex)   ← 写事务在这一份上修改，commit 时与 published 交换
//! ```
//!
//! - 打开事务：锁住 scratch（同一数据块上的事务串行化），把 published 复制到 scratch
//! - 修改：`sentinel[handle]` 写新值，`sentinel.old_values()[handle]` 读旧值
//! - 提交：交换两份快照（无堆分配），旧快照成为下一次事务的 scratch
//! - 未提交即丢弃：published 保持不变，调用方看不到任何修改
//!
//! 状态跟踪器在每次更新时都会重写记录的全部字段，
//! "逻辑上没有变化"不等于"没有写入"。

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::sync::OnceLock;

/// 可以放进数据块的状态记录
///
/// 对所有 `Clone + Send + Sync + Debug + 'static` 类型自动实现。
/// 记录应当是只含值/时间戳/质量/错误码的普通聚合体。
pub trait Record: Any + Send + Sync + fmt::Debug {
    /// 复制出一份新记录（仅在 realize 时使用）
    fn clone_record(&self) -> Box<dyn Record>;
    /// 用另一份同类型记录覆盖自身（不分配内存）
    fn assign_from(&mut self, other: &dyn Record);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

// `&T`、`Box<dyn Record>` 本身也满足这个约束，调用方法前要先解引用到 `dyn Record`
impl<T: Any + Clone + Send + Sync + fmt::Debug> Record for T {
    fn clone_record(&self) -> Box<dyn Record> {
        Box::new(self.clone())
    }

    fn assign_from(&mut self, other: &dyn Record) {
        match other.as_any().downcast_ref::<T>() {
            Some(source) => self.clone_from(source),
            None => panic!(
                "data block layout corrupted: expected {}",
                std::any::type_name::<T>()
            ),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

type Snapshot = Vec<Box<dyn Record>>;

/// 数据块中一条记录的句柄
///
/// 只保存下标；下标在 attach 时分配，此后永不改变。
pub struct ObjectHandle<T> {
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ObjectHandle<T> {
    fn new(index: usize) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// 记录在数据块中的下标
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T> Clone for ObjectHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ObjectHandle<T> {}

impl<T> fmt::Debug for ObjectHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectHandle<{}>({})", std::any::type_name::<T>(), self.index)
    }
}

fn downcast<T: Record>(snapshot: &[Box<dyn Record>], handle: ObjectHandle<T>) -> &T {
    (*snapshot[handle.index])
        .as_any()
        .downcast_ref::<T>()
        .unwrap_or_else(|| panic!("record type mismatch for {:?}", handle))
}

fn downcast_mut<T: Record>(snapshot: &mut [Box<dyn Record>], handle: ObjectHandle<T>) -> &mut T {
    (*snapshot[handle.index])
        .as_any_mut()
        .downcast_mut::<T>()
        .unwrap_or_else(|| panic!("record type mismatch for {:?}", handle))
}

struct Buffers {
    published: RwLock<Snapshot>,
    scratch: Mutex<Snapshot>,
}

/// 双缓冲数据块
pub struct DataBlock {
    name: &'static str,
    schema: Mutex<Snapshot>,
    buffers: OnceLock<Buffers>,
}

impl DataBlock {
    /// 创建空数据块（布局尚未确定）
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            schema: Mutex::new(Vec::new()),
            buffers: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 追加一条记录，返回其句柄
    ///
    /// # Panics
    ///
    /// 数据块已经 realize 之后调用（属于编程错误）。
    pub fn append_object<T: Record + Default>(&self) -> ObjectHandle<T> {
        assert!(
            !self.is_realized(),
            "cannot attach to data block `{}` after it has been realized",
            self.name
        );
        let mut schema = self.schema.lock();
        let index = schema.len();
        schema.push(Box::new(T::default()));
        ObjectHandle::new(index)
    }

    /// 固定布局并分配两份快照
    ///
    /// # Panics
    ///
    /// 重复 realize。
    pub fn realize(&self) {
        let published = std::mem::take(&mut *self.schema.lock());
        let scratch: Snapshot = published.iter().map(|record| (**record).clone_record()).collect();
        let buffers = Buffers {
            published: RwLock::new(published),
            scratch: Mutex::new(scratch),
        };
        if self.buffers.set(buffers).is_err() {
            panic!("data block `{}` realized twice", self.name);
        }
    }

    #[inline]
    pub fn is_realized(&self) -> bool {
        self.buffers.get().is_some()
    }

    /// 记录数量
    pub fn len(&self) -> usize {
        match self.buffers.get() {
            Some(buffers) => buffers.published.read().len(),
            None => self.schema.lock().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn buffers(&self) -> &Buffers {
        self.buffers
            .get()
            .unwrap_or_else(|| panic!("data block `{}` used before it was realized", self.name))
    }

    /// 读取已提交快照中的一条记录
    ///
    /// # Panics
    ///
    /// 数据块尚未 realize。
    pub fn read<T: Record, R>(&self, handle: ObjectHandle<T>, f: impl FnOnce(&T) -> R) -> R {
        let published = self.buffers().published.read();
        f(downcast(&published, handle))
    }

    /// 读取已提交快照中的一条记录；尚未 realize 时返回 `None`
    pub fn try_read<T: Record, R>(&self, handle: ObjectHandle<T>, f: impl FnOnce(&T) -> R) -> Option<R> {
        let buffers = self.buffers.get()?;
        let published = buffers.published.read();
        Some(f(downcast(&published, handle)))
    }

    /// 按下标以 `Any` 形式读取（供读句柄使用）
    pub(crate) fn try_read_any<R>(&self, index: usize, f: impl FnOnce(&dyn Any) -> R) -> Option<R> {
        let buffers = self.buffers.get()?;
        let published = buffers.published.read();
        let record = published.get(index)?;
        Some(f((**record).as_any()))
    }

    /// 打开写事务
    ///
    /// 同一数据块上的事务互斥；不同数据块之间互不影响。
    ///
    /// # Panics
    ///
    /// 数据块尚未 realize。
    pub fn write_sentinel(&self) -> WriteSentinel<'_> {
        let buffers = self.buffers();
        let mut scratch = buffers.scratch.lock();
        let published = buffers.published.read();
        for (target, source) in scratch.iter_mut().zip(published.iter()) {
            (**target).assign_from(&**source);
        }
        WriteSentinel {
            buffers,
            scratch,
            published: Some(published),
        }
    }
}

impl fmt::Debug for DataBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataBlock")
            .field("name", &self.name)
            .field("realized", &self.is_realized())
            .field("len", &self.len())
            .finish()
    }
}

/// 数据块写事务（作用域哨兵）
///
/// - `sentinel[handle]`：新快照（可写）
/// - `sentinel.old_values()[handle]`：上一次提交的快照（只读）
/// - [`commit`](Self::commit)：原子发布；未提交即 drop 则丢弃全部修改
pub struct WriteSentinel<'a> {
    buffers: &'a Buffers,
    scratch: MutexGuard<'a, Snapshot>,
    published: Option<RwLockReadGuard<'a, Snapshot>>,
}

impl<'a> WriteSentinel<'a> {
    /// 上一次提交的快照
    pub fn old_values(&self) -> OldValues<'_> {
        OldValues {
            snapshot: self.previous(),
        }
    }

    fn previous(&self) -> &[Box<dyn Record>] {
        match &self.published {
            Some(guard) => guard.as_slice(),
            None => unreachable!("write sentinel used after commit"),
        }
    }

    /// 同时取得一条记录的新值（可写）和旧值（只读）
    pub fn entry<T: Record>(&mut self, handle: ObjectHandle<T>) -> (&mut T, &T) {
        let old = match &self.published {
            Some(guard) => downcast(guard.as_slice(), handle),
            None => unreachable!("write sentinel used after commit"),
        };
        let new = downcast_mut(&mut self.scratch, handle);
        (new, old)
    }

    /// 提交事务：新快照成为已发布快照
    pub fn commit(mut self) {
        // 先释放读锁，再获取写锁
        drop(self.published.take());
        let mut published = self.buffers.published.write();
        std::mem::swap(&mut *published, &mut *self.scratch);
    }
}

impl<T: Record> Index<ObjectHandle<T>> for WriteSentinel<'_> {
    type Output = T;

    fn index(&self, handle: ObjectHandle<T>) -> &T {
        downcast(&self.scratch, handle)
    }
}

impl<T: Record> IndexMut<ObjectHandle<T>> for WriteSentinel<'_> {
    fn index_mut(&mut self, handle: ObjectHandle<T>) -> &mut T {
        downcast_mut(&mut self.scratch, handle)
    }
}

/// 写事务中上一次提交的快照视图
pub struct OldValues<'s> {
    snapshot: &'s [Box<dyn Record>],
}

impl<T: Record> Index<ObjectHandle<T>> for OldValues<'_> {
    type Output = T;

    fn index(&self, handle: ObjectHandle<T>) -> &T {
        downcast(self.snapshot, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Counter {
        value: u32,
        stamp: u64,
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Flag(bool);

    fn block_with_two_records() -> (DataBlock, ObjectHandle<Counter>, ObjectHandle<Flag>) {
        let block = DataBlock::new("test");
        let counter = block.append_object::<Counter>();
        let flag = block.append_object::<Flag>();
        block.realize();
        (block, counter, flag)
    }

    #[test]
    fn test_handles_are_stable_indices() {
        let (block, counter, flag) = block_with_two_records();
        assert_eq!(counter.index(), 0);
        assert_eq!(flag.index(), 1);
        assert_eq!(block.len(), 2);
        assert!(block.is_realized());
    }

    #[test]
    fn test_commit_publishes_new_values() {
        let (block, counter, _) = block_with_two_records();

        let mut sentinel = block.write_sentinel();
        sentinel[counter].value = 7;
        assert_eq!(sentinel.old_values()[counter].value, 0);
        sentinel.commit();

        assert_eq!(block.read(counter, |c| c.value), 7);
    }

    #[test]
    fn test_drop_without_commit_discards() {
        let (block, counter, flag) = block_with_two_records();

        {
            let mut sentinel = block.write_sentinel();
            sentinel[counter].value = 99;
            sentinel[flag].0 = true;
        }

        assert_eq!(block.read(counter, |c| c.clone()), Counter::default());
        assert!(!block.read(flag, |f| f.0));
    }

    #[test]
    fn test_unwritten_fields_survive_swap() {
        let (block, counter, flag) = block_with_two_records();

        let mut sentinel = block.write_sentinel();
        sentinel[counter].value = 1;
        sentinel[flag].0 = true;
        sentinel.commit();

        // 第二次事务只写 counter，flag 不能回退到两次之前的值
        let mut sentinel = block.write_sentinel();
        sentinel[counter].value = 2;
        sentinel.commit();

        assert_eq!(block.read(counter, |c| c.value), 2);
        assert!(block.read(flag, |f| f.0));
    }

    #[test]
    fn test_entry_gives_old_and_new() {
        let (block, counter, _) = block_with_two_records();

        let mut sentinel = block.write_sentinel();
        sentinel[counter].stamp = 10;
        sentinel.commit();

        let mut sentinel = block.write_sentinel();
        let (new, old) = sentinel.entry(counter);
        assert_eq!(old.stamp, 10);
        new.stamp = old.stamp + 5;
        sentinel.commit();

        assert_eq!(block.read(counter, |c| c.stamp), 15);
    }

    #[test]
    fn test_try_read_before_realize() {
        let block = DataBlock::new("pending");
        let counter = block.append_object::<Counter>();
        assert!(block.try_read(counter, |c| c.value).is_none());
        assert_eq!(block.len(), 1);
    }

    #[test]
    #[should_panic(expected = "after it has been realized")]
    fn test_append_after_realize_panics() {
        let (block, _, _) = block_with_two_records();
        let _ = block.append_object::<Counter>();
    }

    #[test]
    #[should_panic(expected = "before it was realized")]
    fn test_transaction_before_realize_panics() {
        let block = DataBlock::new("pending");
        let _ = block.append_object::<Counter>();
        let _ = block.write_sentinel();
    }
}
