use super::Changes;
use crate::attribute::{self, Access, Attribute};
use crate::data_block::{DataBlock, ObjectHandle, WriteSentinel};
use crate::event::{CHANGED_EVENT, EventId, EventTable, PendingEventList, VALUE_EVENT};
use crate::read_handle::{Projection, ReadHandle, ReadHandleError};
use pollbatch_protocol::{DataValue, IoError, PointValue, Timestamp};
use std::any::Any;
use std::sync::Arc;

/// 单点读状态记录
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueRecord<T> {
    pub value: T,
    pub change_time: Timestamp,
}

fn project_value<T: PointValue>(record: &dyn Any) -> Option<DataValue> {
    record
        .downcast_ref::<ValueRecord<T>>()
        .map(|r| r.value.to_data_value())
}

fn project_change_time<T: PointValue>(record: &dyn Any) -> Option<DataValue> {
    record
        .downcast_ref::<ValueRecord<T>>()
        .map(|r| DataValue::Timestamp(r.change_time))
}

/// 单点读状态
///
/// 同一批次中每个输入点各有一份，在公共状态之后、同一事务内更新。
/// 读取失败时写入 `T::default()`；质量由批次公共状态表达，这里不重复。
#[derive(Debug)]
pub struct PerValueReadState<T: PointValue> {
    block: Arc<DataBlock>,
    record: ObjectHandle<ValueRecord<T>>,
    value_attribute: Attribute,
    value_event: EventId,
    changed_event: EventId,
}

impl<T: PointValue> PerValueReadState<T> {
    pub fn attach(block: &Arc<DataBlock>, events: &EventTable, owner: &Arc<str>, access: Access) -> Self {
        Self {
            block: Arc::clone(block),
            record: block.append_object(),
            value_attribute: Attribute::value(T::DATA_TYPE, access),
            value_event: events.register(owner, VALUE_EVENT),
            changed_event: events.register(owner, CHANGED_EVENT),
        }
    }

    /// 写入本周期的值（或错误）
    ///
    /// - `value` 事件：值本身变化
    /// - `changed` 事件：值变化，或批次质量/错误变化
    /// - `changeTime` 仅在 `changed` 时更新为 `timestamp`，否则原样重写
    ///
    /// 返回本点是否 `changed`。
    pub fn update(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: Timestamp,
        outcome: Result<T, IoError>,
        common: Changes,
        events: &mut PendingEventList,
    ) -> bool {
        let (new, old) = sentinel.entry(self.record);

        let value = outcome.unwrap_or_default();
        let value_changed = value != old.value;
        let changed = value_changed || common.any();

        new.change_time = if changed { timestamp } else { old.change_time };
        new.value = value;

        if value_changed {
            events.push(self.value_event);
        }
        if changed {
            events.push(self.changed_event);
        }
        changed
    }

    pub fn resolve_attribute(&self, name: &str) -> Option<Attribute> {
        attribute::find(&[self.value_attribute, attribute::CHANGE_TIME], name)
    }

    pub fn resolve_event(&self, name: &str) -> Option<EventId> {
        match name {
            VALUE_EVENT => Some(self.value_event),
            CHANGED_EVENT => Some(self.changed_event),
            _ => None,
        }
    }

    pub fn read_handle(&self, attribute: &Attribute) -> Result<ReadHandle, ReadHandleError> {
        let project: Projection = match attribute.name {
            attribute::VALUE_NAME => project_value::<T>,
            attribute::CHANGE_TIME_NAME => project_change_time::<T>,
            _ => return Err(ReadHandleError::UnknownAttribute(attribute.name)),
        };
        Ok(ReadHandle::new(&self.block, self.record, *attribute, project))
    }

    /// 已提交的记录
    pub fn current(&self) -> ValueRecord<T> {
        self.block.read(self.record, |r| r.clone())
    }

    pub fn value_event(&self) -> EventId {
        self.value_event
    }

    pub fn changed_event(&self) -> EventId {
        self.changed_event
    }
}
