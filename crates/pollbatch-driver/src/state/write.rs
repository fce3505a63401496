use crate::attribute::{self, Attribute};
use crate::data_block::{DataBlock, ObjectHandle, WriteSentinel};
use crate::event::{EventId, EventTable, PendingEventList, WRITE_ERROR_EVENT, WRITTEN_EVENT};
use crate::read_handle::{Projection, ReadHandle, ReadHandleError};
use pollbatch_protocol::{DataValue, ErrorCode, IoError, NO_ERROR, Timestamp, error_code};
use std::any::Any;
use std::sync::Arc;

/// 写状态记录
///
/// 初始 `writeError` 为 `0`：从未写过不算错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    pub write_time: Timestamp,
    pub write_error: ErrorCode,
}

impl Default for WriteRecord {
    fn default() -> Self {
        Self {
            write_time: Timestamp::NEVER,
            write_error: NO_ERROR,
        }
    }
}

const ATTRIBUTES: [Attribute; 2] = [attribute::WRITE_TIME, attribute::WRITE_ERROR];

fn project_write_time(record: &dyn Any) -> Option<DataValue> {
    record
        .downcast_ref::<WriteRecord>()
        .map(|r| DataValue::Timestamp(r.write_time))
}

fn project_write_error(record: &dyn Any) -> Option<DataValue> {
    record
        .downcast_ref::<WriteRecord>()
        .map(|r| DataValue::ErrorCode(r.write_error))
}

/// 写状态（每个输出点一份，批次另有一份）
#[derive(Debug)]
pub struct WriteState {
    block: Arc<DataBlock>,
    record: ObjectHandle<WriteRecord>,
    written_event: EventId,
    error_event: EventId,
}

impl WriteState {
    pub fn attach(block: &Arc<DataBlock>, events: &EventTable, owner: &Arc<str>) -> Self {
        Self {
            block: Arc::clone(block),
            record: block.append_object(),
            written_event: events.register(owner, WRITTEN_EVENT),
            error_event: events.register(owner, WRITE_ERROR_EVENT),
        }
    }

    /// 记录一次写出尝试
    ///
    /// `writeTime` 无条件写入；成功追加 `written`，失败追加 `writeError`，二者互斥。
    pub fn update(
        &self,
        sentinel: &mut WriteSentinel<'_>,
        timestamp: Timestamp,
        outcome: Result<(), IoError>,
        events: &mut PendingEventList,
    ) {
        sentinel[self.record] = WriteRecord {
            write_time: timestamp,
            write_error: error_code(outcome),
        };

        events.push(match outcome {
            Ok(()) => self.written_event,
            Err(_) => self.error_event,
        });
    }

    pub fn resolve_attribute(&self, name: &str) -> Option<Attribute> {
        attribute::find(&ATTRIBUTES, name)
    }

    pub fn resolve_event(&self, name: &str) -> Option<EventId> {
        match name {
            WRITTEN_EVENT => Some(self.written_event),
            WRITE_ERROR_EVENT => Some(self.error_event),
            _ => None,
        }
    }

    pub fn read_handle(&self, attribute: &Attribute) -> Result<ReadHandle, ReadHandleError> {
        let project: Projection = match attribute.name {
            attribute::WRITE_TIME_NAME => project_write_time,
            attribute::WRITE_ERROR_NAME => project_write_error,
            _ => return Err(ReadHandleError::UnknownAttribute(attribute.name)),
        };
        Ok(ReadHandle::new(&self.block, self.record, *attribute, project))
    }

    /// 已提交的记录
    pub fn current(&self) -> WriteRecord {
        self.block.read(self.record, |r| *r)
    }

    pub fn written_event(&self) -> EventId {
        self.written_event
    }

    pub fn error_event(&self) -> EventId {
        self.error_event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Arc<DataBlock>, WriteState, PendingEventList) {
        let block = Arc::new(DataBlock::new("write"));
        let table = EventTable::new();
        let state = WriteState::attach(&block, &table, &Arc::from("out"));
        block.realize();
        table.seal();
        let events = PendingEventList::with_capacity(table.len());
        (block, state, events)
    }

    #[test]
    fn test_initial_record_is_clean() {
        let (_block, state, _events) = fixture();
        assert_eq!(state.current(), WriteRecord::default());
        assert_eq!(state.current().write_error, NO_ERROR);
    }

    #[test]
    fn test_success_and_failure_are_exclusive() {
        let (block, state, mut events) = fixture();

        let mut sentinel = block.write_sentinel();
        state.update(&mut sentinel, Timestamp::from_micros(3), Ok(()), &mut events);
        sentinel.commit();
        assert_eq!(events.as_slice(), &[state.written_event()]);
        assert_eq!(state.current().write_time, Timestamp::from_micros(3));

        events.clear();
        let mut sentinel = block.write_sentinel();
        state.update(
            &mut sentinel,
            Timestamp::from_micros(4),
            Err(IoError::Transport(2)),
            &mut events,
        );
        sentinel.commit();
        assert_eq!(events.as_slice(), &[state.error_event()]);
        assert_eq!(
            state.current(),
            WriteRecord {
                write_time: Timestamp::from_micros(4),
                write_error: IoError::Transport(2).code(),
            }
        );
    }

    #[test]
    fn test_uncommitted_update_is_invisible() {
        let (block, state, mut events) = fixture();
        {
            let mut sentinel = block.write_sentinel();
            state.update(&mut sentinel, Timestamp::from_micros(9), Ok(()), &mut events);
        }
        assert_eq!(state.current(), WriteRecord::default());
    }

    #[test]
    fn test_resolution() {
        let (_block, state, _events) = fixture();
        assert_eq!(state.resolve_attribute("writeError"), Some(attribute::WRITE_ERROR));
        assert_eq!(state.resolve_event("writeError"), Some(state.error_event()));
        assert_eq!(state.resolve_event("read"), None);
        let handle = state.read_handle(&attribute::WRITE_TIME).unwrap();
        assert_eq!(handle.read(), Ok(DataValue::Timestamp(Timestamp::NEVER)));
    }
}
