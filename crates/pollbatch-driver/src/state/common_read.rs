use crate::attribute::{self, Attribute};
use crate::data_block::{DataBlock, ObjectHandle, WriteSentinel};
use crate::event::{EventId, EventTable, PendingEventList, QUALITY_EVENT, READ_EVENT};
use crate::read_handle::{Projection, ReadHandle, ReadHandleError};
use pollbatch_protocol::{DataValue, ErrorCode, IoError, Quality, Timestamp, error_code};
use std::any::Any;
use std::sync::Arc;

/// 批次公共读状态记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonReadRecord {
    pub update_time: Timestamp,
    pub quality: Quality,
    pub error: ErrorCode,
}

impl Default for CommonReadRecord {
    fn default() -> Self {
        Self {
            update_time: Timestamp::NEVER,
            quality: Quality::Bad,
            error: IoError::NoData.code(),
        }
    }
}

/// 一次公共状态更新带来的批次级变化
///
/// 只在同一周期内传给各点的更新函数，不持久化。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Changes {
    pub quality_changed: bool,
    pub error_changed: bool,
}

impl Changes {
    #[inline]
    pub fn any(self) -> bool {
        self.quality_changed || self.error_changed
    }
}

const ATTRIBUTES: [Attribute; 3] = [attribute::UPDATE_TIME, attribute::QUALITY, attribute::ERROR];

fn project_update_time(record: &dyn Any) -> Option<DataValue> {
    record
        .downcast_ref::<CommonReadRecord>()
        .map(|r| DataValue::Timestamp(r.update_time))
}

fn project_quality(record: &dyn Any) -> Option<DataValue> {
    record
        .downcast_ref::<CommonReadRecord>()
        .map(|r| DataValue::Quality(r.quality))
}

fn project_error(record: &dyn Any) -> Option<DataValue> {
    record
        .downcast_ref::<CommonReadRecord>()
        .map(|r| DataValue::ErrorCode(r.error))
}

/// 批次公共读状态
///
/// 每个批次一份，只在读周期的事务中修改，并且总是先于各点更新。
#[derive(Debug)]
pub struct CommonReadState {
    block: Arc<DataBlock>,
    record: ObjectHandle<CommonReadRecord>,
    read_event: EventId,
    quality_event: EventId,
}

impl CommonReadState {
    /// 在数据块中追加记录并注册事件
    pub fn attach(block: &Arc<DataBlock>, events: &EventTable, owner: &Arc<str>) -> Self {
        Self {
            block: Arc::clone(block),
            record: block.append_object(),
            read_event: events.register(owner, READ_EVENT),
            quality_event: events.register(owner, QUALITY_EVENT),
        }
    }

    /// 根据最近一次读取结果更新
    ///
    /// - `updateTime` 无条件写入
    /// - `read` 事件总是追加，`quality` 事件仅在质量变化时追加
    pub fn update(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: Timestamp,
        outcome: Result<(), IoError>,
        events: &mut PendingEventList,
    ) -> Changes {
        let (new, old) = sentinel.entry(self.record);

        let quality = Quality::from_outcome(outcome);
        let error = error_code(outcome);
        let changes = Changes {
            quality_changed: quality != old.quality,
            error_changed: error != old.error,
        };

        *new = CommonReadRecord {
            update_time: timestamp,
            quality,
            error,
        };

        events.push(self.read_event);
        if changes.quality_changed {
            events.push(self.quality_event);
        }
        changes
    }

    pub fn resolve_attribute(&self, name: &str) -> Option<Attribute> {
        attribute::find(&ATTRIBUTES, name)
    }

    pub fn resolve_event(&self, name: &str) -> Option<EventId> {
        match name {
            READ_EVENT => Some(self.read_event),
            QUALITY_EVENT => Some(self.quality_event),
            _ => None,
        }
    }

    pub fn read_handle(&self, attribute: &Attribute) -> Result<ReadHandle, ReadHandleError> {
        let project: Projection = match attribute.name {
            attribute::UPDATE_TIME_NAME => project_update_time,
            attribute::QUALITY_NAME => project_quality,
            attribute::ERROR_NAME => project_error,
            _ => return Err(ReadHandleError::UnknownAttribute(attribute.name)),
        };
        Ok(ReadHandle::new(&self.block, self.record, *attribute, project))
    }

    /// 已提交的记录
    pub fn current(&self) -> CommonReadRecord {
        self.block.read(self.record, |r| *r)
    }

    pub fn read_event(&self) -> EventId {
        self.read_event
    }

    pub fn quality_event(&self) -> EventId {
        self.quality_event
    }
}
