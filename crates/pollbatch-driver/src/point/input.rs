use super::{AbstractInput, Directions, Point};
use crate::attribute::{Access, Attribute};
use crate::data_block::{DataBlock, WriteSentinel};
use crate::event::{EventId, EventTable, PendingEventList};
use crate::read_handle::{ReadHandle, ReadHandleError};
use crate::state::{Changes, PerValueReadState, ValueRecord};
use pollbatch_protocol::{DataType, IoError, PointValue, ReadCommand, ReadPayload, Timestamp};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// 输入点
///
/// 在读载荷的 `offset` 处占据 `T::WIDTH` 字节。
pub struct Input<T: PointValue> {
    name: Arc<str>,
    offset: u32,
    state: PerValueReadState<T>,
}

impl<T: PointValue> Input<T> {
    pub(crate) fn attach(name: Arc<str>, offset: u32, block: &Arc<DataBlock>, events: &EventTable) -> Self {
        let state = PerValueReadState::attach(block, events, &name, Access::Read);
        Self { name, offset, state }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// 已提交的值
    pub fn value(&self) -> T {
        self.state.current().value
    }

    /// 已提交的值与变化时间
    pub fn record(&self) -> ValueRecord<T> {
        self.state.current()
    }

    pub fn state(&self) -> &PerValueReadState<T> {
        &self.state
    }
}

impl<T: PointValue> Point for Input<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn directions(&self) -> Directions {
        Directions::Input
    }

    fn data_type(&self) -> DataType {
        T::DATA_TYPE
    }

    fn resolve_attribute(&self, name: &str) -> Option<Attribute> {
        self.state.resolve_attribute(name)
    }

    fn resolve_event(&self, name: &str) -> Option<EventId> {
        self.state.resolve_event(name)
    }

    fn read_handle(&self, attribute: &Attribute) -> Result<ReadHandle, ReadHandleError> {
        self.state.read_handle(attribute)
    }
}

impl<T: PointValue> AbstractInput for Input<T> {
    fn add_to_read_command(&self, command: &mut ReadCommand) {
        command.add_range(self.offset, T::WIDTH as u32);
    }

    fn update_read_state(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: Timestamp,
        payload: Result<&ReadPayload, IoError>,
        changes: Changes,
        events: &mut PendingEventList,
    ) {
        let outcome = decode_slice(&self.name, self.offset, payload);
        self.state.update(sentinel, timestamp, outcome, changes, events);
    }
}

impl<T: PointValue> fmt::Debug for Input<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .field("data_type", &T::DATA_TYPE)
            .finish()
    }
}

/// 从载荷中取出本点的切片；批次错误原样传递
pub(super) fn decode_slice<T: PointValue>(
    name: &str,
    offset: u32,
    payload: Result<&ReadPayload, IoError>,
) -> Result<T, IoError> {
    let payload = payload?;
    let decoded = payload.decode::<T>(offset);
    if let Err(e) = &decoded {
        debug!("Point {}: {}", name, e);
    }
    decoded
}
