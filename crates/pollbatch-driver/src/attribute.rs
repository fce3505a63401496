//! 属性描述
//!
//! 外部观察者通过名称解析出 [`Attribute`]，再用它换取 [`ReadHandle`](crate::ReadHandle)。
//! 这里只定义引擎需要的最小名称契约，不是通用的反射系统。

use pollbatch_protocol::DataType;

/// 属性访问权限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// 只读
    Read,
    /// 可读可写（输出点的值）
    ReadWrite,
}

/// 属性描述符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub name: &'static str,
    pub data_type: DataType,
    pub access: Access,
}

impl Attribute {
    pub const fn new(name: &'static str, data_type: DataType, access: Access) -> Self {
        Self {
            name,
            data_type,
            access,
        }
    }

    /// 点值属性，类型由点决定
    pub const fn value(data_type: DataType, access: Access) -> Self {
        Self::new(VALUE_NAME, data_type, access)
    }

    #[inline]
    pub fn is_writable(&self) -> bool {
        self.access == Access::ReadWrite
    }
}

pub const UPDATE_TIME_NAME: &str = "updateTime";
pub const QUALITY_NAME: &str = "quality";
pub const ERROR_NAME: &str = "error";
pub const CHANGE_TIME_NAME: &str = "changeTime";
pub const VALUE_NAME: &str = "value";
pub const WRITE_TIME_NAME: &str = "writeTime";
pub const WRITE_ERROR_NAME: &str = "writeError";

/// 最近一次读取完成的时间
pub const UPDATE_TIME: Attribute = Attribute::new(UPDATE_TIME_NAME, DataType::Timestamp, Access::Read);
/// 最近一次读取的质量
pub const QUALITY: Attribute = Attribute::new(QUALITY_NAME, DataType::Quality, Access::Read);
/// 最近一次读取的错误码
pub const ERROR: Attribute = Attribute::new(ERROR_NAME, DataType::ErrorCode, Access::Read);
/// 点值最近一次变化的时间
pub const CHANGE_TIME: Attribute = Attribute::new(CHANGE_TIME_NAME, DataType::Timestamp, Access::Read);
/// 最近一次写出的时间
pub const WRITE_TIME: Attribute = Attribute::new(WRITE_TIME_NAME, DataType::Timestamp, Access::Read);
/// 最近一次写出的错误码
pub const WRITE_ERROR: Attribute = Attribute::new(WRITE_ERROR_NAME, DataType::ErrorCode, Access::Read);

/// 在一组属性中按名称查找
pub(crate) fn find(attributes: &[Attribute], name: &str) -> Option<Attribute> {
    attributes.iter().copied().find(|attribute| attribute.name == name)
}
