use super::input::decode_slice;
use super::{AbstractInput, AbstractOutput, Attachment, Directions, Point};
use crate::attribute::{self, Access, Attribute};
use crate::data_block::WriteSentinel;
use crate::error::DriverError;
use crate::event::{EventId, PendingEventList};
use crate::metrics::BatchMetrics;
use crate::queue::SingleValueQueue;
use crate::read_handle::{ReadHandle, ReadHandleError};
use crate::state::{Changes, PerValueReadState, WriteRecord, WriteState};
use crossbeam_channel::Sender;
use pollbatch_protocol::{
    DataType, DataValue, IoError, PointValue, ReadCommand, ReadPayload, Timestamp, WriteCommand, WriteFragment,
};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::trace;

/// 输出点
///
/// 写入先进入单槽队列，由下一个写周期取走并编码到写命令的 `offset` 处。
/// 开启回读时，同一偏移的设备值也会在读周期中跟踪。
pub struct Output<T: PointValue> {
    name: Arc<str>,
    offset: u32,
    queue: SingleValueQueue<T>,
    write_state: WriteState,
    readback: Option<PerValueReadState<T>>,
    write_trigger: Sender<()>,
    metrics: Arc<BatchMetrics>,
}

impl<T: PointValue> Output<T> {
    pub(crate) fn attach(name: Arc<str>, offset: u32, readback: bool, ctx: &Attachment<'_>) -> Self {
        let write_state = WriteState::attach(ctx.write_block, ctx.events, &name);
        let readback = readback
            .then(|| PerValueReadState::attach(ctx.read_block, ctx.events, &name, Access::ReadWrite));
        Self {
            name,
            offset,
            queue: SingleValueQueue::new(),
            write_state,
            readback,
            write_trigger: ctx.write_trigger.clone(),
            metrics: Arc::clone(ctx.metrics),
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// 提交一个待写值
    ///
    /// 不阻塞、不分配；尚未写出的旧值会被覆盖（最新值优先）。
    pub fn write_value(&self, value: T) {
        if self.queue.enqueue(value) {
            self.metrics.writes_coalesced.fetch_add(1, Ordering::Relaxed);
            trace!("Output {}: pending value overwritten", self.name);
        }
        // 唤醒写线程；已有未处理的唤醒时忽略
        let _ = self.write_trigger.try_send(());
    }

    /// 已提交的写状态
    pub fn last_write(&self) -> WriteRecord {
        self.write_state.current()
    }

    /// 回读值（未开启回读时为 `None`）
    pub fn readback_value(&self) -> Option<T> {
        self.readback.as_ref().map(|state| state.current().value)
    }

    pub fn write_state(&self) -> &WriteState {
        &self.write_state
    }

    pub fn readback(&self) -> Option<&PerValueReadState<T>> {
        self.readback.as_ref()
    }

    fn value_attribute() -> Attribute {
        Attribute::value(T::DATA_TYPE, Access::ReadWrite)
    }
}

impl<T: PointValue> Point for Output<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn directions(&self) -> Directions {
        if self.readback.is_some() {
            Directions::InputOutput
        } else {
            Directions::Output
        }
    }

    fn data_type(&self) -> DataType {
        T::DATA_TYPE
    }

    fn resolve_attribute(&self, name: &str) -> Option<Attribute> {
        if name == attribute::VALUE_NAME {
            return Some(Self::value_attribute());
        }
        self.write_state
            .resolve_attribute(name)
            .or_else(|| self.readback.as_ref()?.resolve_attribute(name))
    }

    fn resolve_event(&self, name: &str) -> Option<EventId> {
        self.write_state
            .resolve_event(name)
            .or_else(|| self.readback.as_ref()?.resolve_event(name))
    }

    fn read_handle(&self, attribute: &Attribute) -> Result<ReadHandle, ReadHandleError> {
        match attribute.name {
            attribute::WRITE_TIME_NAME | attribute::WRITE_ERROR_NAME => self.write_state.read_handle(attribute),
            attribute::VALUE_NAME | attribute::CHANGE_TIME_NAME => match &self.readback {
                Some(state) => state.read_handle(attribute),
                None => Err(ReadHandleError::NotReadable(attribute.name)),
            },
            _ => Err(ReadHandleError::UnknownAttribute(attribute.name)),
        }
    }
}

impl<T: PointValue> AbstractOutput for Output<T> {
    fn add_to_write_command(&self, command: &mut WriteCommand) -> bool {
        match self.queue.dequeue() {
            Some(value) => {
                command.push(WriteFragment::encode(self.offset, &value));
                true
            },
            None => false,
        }
    }

    fn update_write_state(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: Timestamp,
        outcome: Result<(), IoError>,
        events: &mut PendingEventList,
    ) {
        self.write_state.update(sentinel, timestamp, outcome, events);
    }

    fn write_data_value(&self, value: DataValue) -> Result<(), DriverError> {
        let typed = T::from_data_value(value).ok_or_else(|| DriverError::TypeMismatch {
            point: self.name.to_string(),
            expected: T::DATA_TYPE,
            actual: value.data_type(),
        })?;
        self.write_value(typed);
        Ok(())
    }
}

impl<T: PointValue> AbstractInput for Output<T> {
    fn add_to_read_command(&self, command: &mut ReadCommand) {
        if self.readback.is_some() {
            command.add_range(self.offset, T::WIDTH as u32);
        }
    }

    fn update_read_state(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: Timestamp,
        payload: Result<&ReadPayload, IoError>,
        changes: Changes,
        events: &mut PendingEventList,
    ) {
        if let Some(state) = &self.readback {
            let outcome = decode_slice(&self.name, self.offset, payload);
            state.update(sentinel, timestamp, outcome, changes, events);
        }
    }
}

impl<T: PointValue> fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Output")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .field("data_type", &T::DATA_TYPE)
            .field("readback", &self.readback.is_some())
            .finish()
    }
}
