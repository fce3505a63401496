//! 读句柄：绑定到数据块中一条记录的惰性取值
//!
//! 句柄只保存数据块、下标和一个投影函数，每次 [`ReadHandle::read`]
//! 都从已提交快照中取最新值，不缓存。

use crate::attribute::Attribute;
use crate::data_block::{DataBlock, ObjectHandle, Record};
use pollbatch_protocol::DataValue;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// 从记录中投影出一个属性值
pub(crate) type Projection = fn(&dyn Any) -> Option<DataValue>;

/// 读句柄错误
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadHandleError {
    /// 属性不属于该对象
    #[error("Unknown attribute: {0}")]
    UnknownAttribute(&'static str),

    /// 属性存在但不可读（例如没有回读的输出值）
    #[error("Attribute is not readable: {0}")]
    NotReadable(&'static str),

    /// 数据块尚未固定布局
    #[error("Data block is not realized yet")]
    NotRealized,

    /// 记录类型与投影函数不一致
    #[error("Record type mismatch for attribute {0}")]
    TypeMismatch(&'static str),
}

/// 读句柄
#[derive(Clone)]
pub struct ReadHandle {
    block: Arc<DataBlock>,
    index: usize,
    attribute: Attribute,
    project: Projection,
}

impl ReadHandle {
    pub(crate) fn new<T: Record>(
        block: &Arc<DataBlock>,
        record: ObjectHandle<T>,
        attribute: Attribute,
        project: Projection,
    ) -> Self {
        Self {
            block: Arc::clone(block),
            index: record.index(),
            attribute,
            project,
        }
    }

    pub fn attribute(&self) -> Attribute {
        self.attribute
    }

    /// 读取已提交的最新值
    pub fn read(&self) -> Result<DataValue, ReadHandleError> {
        self.block
            .try_read_any(self.index, self.project)
            .ok_or(ReadHandleError::NotRealized)?
            .ok_or(ReadHandleError::TypeMismatch(self.attribute.name))
    }
}

impl fmt::Debug for ReadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadHandle")
            .field("block", &self.block.name())
            .field("index", &self.index)
            .field("attribute", &self.attribute.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{Access, Attribute};
    use pollbatch_protocol::DataType;

    #[derive(Debug, Clone, Default)]
    struct Counter {
        hits: u32,
    }

    fn project_hits(record: &dyn Any) -> Option<DataValue> {
        record.downcast_ref::<Counter>().map(|c| DataValue::U32(c.hits))
    }

    const HITS: Attribute = Attribute::new("hits", DataType::U32, Access::Read);

    #[test]
    fn test_read_before_realize() {
        let block = Arc::new(DataBlock::new("test"));
        let record = block.append_object::<Counter>();
        let handle = ReadHandle::new(&block, record, HITS, project_hits);
        assert_eq!(handle.read(), Err(ReadHandleError::NotRealized));
    }

    #[test]
    fn test_read_follows_commits() {
        let block = Arc::new(DataBlock::new("test"));
        let record = block.append_object::<Counter>();
        block.realize();

        let handle = ReadHandle::new(&block, record, HITS, project_hits);
        assert_eq!(handle.read(), Ok(DataValue::U32(0)));

        let mut sentinel = block.write_sentinel();
        sentinel[record].hits = 7;
        sentinel.commit();
        assert_eq!(handle.read(), Ok(DataValue::U32(7)));
    }

    #[test]
    fn test_type_mismatch() {
        fn wrong(record: &dyn Any) -> Option<DataValue> {
            record.downcast_ref::<u64>().map(|v| DataValue::U64(*v))
        }

        let block = Arc::new(DataBlock::new("test"));
        let record = block.append_object::<Counter>();
        block.realize();

        let handle = ReadHandle::new(&block, record, HITS, wrong);
        assert_eq!(handle.read(), Err(ReadHandleError::TypeMismatch("hits")));
    }
}
