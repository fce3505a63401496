//! 点抽象
//!
//! 批次只通过 [`AbstractInput`] / [`AbstractOutput`] 两个 trait 调度点，
//! 不检查具体类型。方向是一个封闭集合：
//!
//! - [`Input<T>`]：只读
//! - [`Output<T>`]：只写；开启回读时同时实现 [`AbstractInput`]（`InputOutput`）

mod input;
mod output;

pub use input::Input;
pub use output::Output;

use crate::attribute::Attribute;
use crate::data_block::{DataBlock, WriteSentinel};
use crate::error::DriverError;
use crate::event::{EventId, EventTable, PendingEventList};
use crate::metrics::BatchMetrics;
use crate::read_handle::{ReadHandle, ReadHandleError};
use crate::state::Changes;
use crossbeam_channel::Sender;
use pollbatch_protocol::{DataType, DataValue, IoError, ReadCommand, ReadPayload, Timestamp, WriteCommand};
use std::sync::Arc;

/// 挂载点时需要的批次资源
pub(crate) struct Attachment<'a> {
    pub read_block: &'a Arc<DataBlock>,
    pub write_block: &'a Arc<DataBlock>,
    pub events: &'a EventTable,
    pub write_trigger: &'a Sender<()>,
    pub metrics: &'a Arc<BatchMetrics>,
}

/// 点的方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directions {
    Input,
    Output,
    InputOutput,
}

impl Directions {
    #[inline]
    pub fn is_input(self) -> bool {
        matches!(self, Directions::Input | Directions::InputOutput)
    }

    #[inline]
    pub fn is_output(self) -> bool {
        matches!(self, Directions::Output | Directions::InputOutput)
    }
}

/// 所有点共有的能力：名称、方向与属性/事件解析
pub trait Point: Send + Sync {
    fn name(&self) -> &str;

    fn directions(&self) -> Directions;

    /// 点值类型
    fn data_type(&self) -> DataType;

    fn resolve_attribute(&self, name: &str) -> Option<Attribute>;

    fn resolve_event(&self, name: &str) -> Option<EventId>;

    fn read_handle(&self, attribute: &Attribute) -> Result<ReadHandle, ReadHandleError>;
}

/// 输入能力：参与读命令和读事务
pub trait AbstractInput: Point {
    /// 把自己需要的地址区间加入读命令（构造读命令时调用一次）
    fn add_to_read_command(&self, command: &mut ReadCommand);

    /// 用本周期的载荷（或批次错误）更新读状态
    ///
    /// `payload` 为 `Err` 时点不解码，直接以该错误更新。
    fn update_read_state(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: Timestamp,
        payload: Result<&ReadPayload, IoError>,
        changes: Changes,
        events: &mut PendingEventList,
    );
}

/// 输出能力：参与写命令和写事务
pub trait AbstractOutput: Point {
    /// 取出待写值并追加到写命令
    ///
    /// 返回 `false` 表示没有待写值，本周期跳过该输出。
    fn add_to_write_command(&self, command: &mut WriteCommand) -> bool;

    /// 更新写状态（只对本周期真正加入写命令的输出调用）
    fn update_write_state(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: Timestamp,
        outcome: Result<(), IoError>,
        events: &mut PendingEventList,
    );

    /// 以动态类型的值发起写入
    fn write_data_value(&self, value: DataValue) -> Result<(), DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directions() {
        assert!(Directions::Input.is_input());
        assert!(!Directions::Input.is_output());
        assert!(Directions::Output.is_output());
        assert!(Directions::InputOutput.is_input() && Directions::InputOutput.is_output());
    }
}
