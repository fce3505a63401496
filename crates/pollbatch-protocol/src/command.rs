//! 命令与载荷类型
//!
//! 与传输层交换的不透明载体：
//! - [`ReadCommand`]：一次批量读取需要覆盖的地址区间，以及预分配的 [`ReadPayload`]
//! - [`WriteCommand`]：本周期需要写出的 [`WriteFragment`] 列表
//!
//! 引擎本身不解释载荷字节，每个点只按自己的偏移取切片。

use crate::error::IoError;
use crate::value::{MAX_VALUE_WIDTH, PointValue};
use bytes::BytesMut;

/// 读命令中的一个地址区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRange {
    /// 载荷内的起始偏移
    pub offset: u32,
    /// 字节数
    pub len: u32,
}

impl ReadRange {
    /// 区间终点（不含）；用 u64 计算，不会溢出
    #[inline]
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.len)
    }
}

/// 读命令的响应载荷
///
/// 缓冲区在读命令构造时按区间跨度预分配，传输层每个周期在其中填充数据，
/// 只要不超过容量就不会发生堆分配。
#[derive(Debug, Default)]
pub struct ReadPayload {
    data: BytesMut,
}

impl ReadPayload {
    /// 创建指定容量的空载荷
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// 清空载荷（保留容量）
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// 用给定字节覆盖载荷内容
    #[inline]
    pub fn fill_from_slice(&mut self, bytes: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(bytes);
    }

    /// 传输层直接写入的缓冲区
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.data
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// 在指定偏移处解码点值
    #[inline]
    pub fn decode<T: PointValue>(&self, offset: u32) -> Result<T, IoError> {
        T::decode_at(&self.data, offset)
    }
}

/// 批量读命令
///
/// 由批次在第一次读周期时根据已挂载的输入构造一次，此后每个周期复用。
#[derive(Debug, Default)]
pub struct ReadCommand {
    ranges: Vec<ReadRange>,
    span: u32,
    payload: ReadPayload,
}

impl ReadCommand {
    /// 创建空读命令，`expected_ranges` 为预期区间数量
    pub fn with_capacity(expected_ranges: usize) -> Self {
        Self {
            ranges: Vec::with_capacity(expected_ranges),
            span: 0,
            payload: ReadPayload::default(),
        }
    }

    /// 添加一个需要读取的区间
    pub fn add_range(&mut self, offset: u32, len: u32) {
        let range = ReadRange { offset, len };
        // 超出 32 位地址空间的区间在挂载点时已被拒绝，这里只做饱和
        let end = u32::try_from(range.end()).unwrap_or(u32::MAX);
        self.span = self.span.max(end);
        self.ranges.push(range);
    }

    /// 完成构造：按区间跨度预分配载荷缓冲区
    pub fn finish(&mut self) {
        self.ranges.sort_by_key(|r| r.offset);
        self.payload = ReadPayload::with_capacity(self.span as usize);
    }

    /// 需要读取的全部区间（按偏移排序）
    #[inline]
    pub fn ranges(&self) -> &[ReadRange] {
        &self.ranges
    }

    /// 载荷需要覆盖的总字节数（最大区间末端）
    #[inline]
    pub fn span(&self) -> u32 {
        self.span
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    #[inline]
    pub fn payload(&self) -> &ReadPayload {
        &self.payload
    }

    #[inline]
    pub fn payload_mut(&mut self) -> &mut ReadPayload {
        &mut self.payload
    }
}

/// 写命令中的一个片段
///
/// 定长 8 字节数据区 + `Copy`，追加到预分配的写命令中时不会触发堆分配。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteFragment {
    /// 目标偏移
    pub offset: u32,
    /// 有效字节数
    pub len: u8,
    /// 数据（大端）
    pub data: [u8; MAX_VALUE_WIDTH],
}

impl WriteFragment {
    /// 编码一个点值
    pub fn encode<T: PointValue>(offset: u32, value: &T) -> Self {
        const { assert!(T::WIDTH <= MAX_VALUE_WIDTH) };
        let mut data = [0u8; MAX_VALUE_WIDTH];
        value.encode(&mut data[..T::WIDTH]);
        Self {
            offset,
            len: T::WIDTH as u8,
            data,
        }
    }

    /// 有效数据
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

/// 批量写命令
///
/// 每个写周期开始时清空（内容全新，缓冲区复用），
/// 各输出按挂载顺序追加自己的片段。
#[derive(Debug, Default)]
pub struct WriteCommand {
    fragments: Vec<WriteFragment>,
}

impl WriteCommand {
    /// 按输出数量预分配
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fragments: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.fragments.clear();
    }

    /// 追加片段
    ///
    /// 批次保证片段数量不超过输出数量，因此不会超出预分配容量。
    #[inline]
    pub fn push(&mut self, fragment: WriteFragment) {
        debug_assert!(
            self.fragments.len() < self.fragments.capacity(),
            "write command capacity exceeded"
        );
        self.fragments.push(fragment);
    }

    #[inline]
    pub fn fragments(&self) -> &[WriteFragment] {
        &self.fragments
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.fragments.capacity()
    }
}
