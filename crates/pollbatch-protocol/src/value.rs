//! 点值类型与定长编解码
//!
//! 每个点在读载荷/写命令中占据一段定长切片（大端字节序），
//! [`PointValue`] 定义了切片与 Rust 值之间的转换契约。

use crate::error::IoError;
use crate::quality::Quality;
use crate::timestamp::Timestamp;
use std::fmt;

/// 单个写片段能容纳的最大字节数
pub const MAX_VALUE_WIDTH: usize = 8;

/// 点值的数据类型（配置文件中使用小写名称）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DataType {
    Bool,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// 仅用于属性（时间戳字段）
    Timestamp,
    /// 仅用于属性（质量字段）
    Quality,
    /// 仅用于属性（错误码字段）
    ErrorCode,
}

impl DataType {
    /// 在载荷中的字节宽度；属性专用类型返回 `None`
    pub fn width(self) -> Option<usize> {
        match self {
            DataType::Bool => Some(1),
            DataType::I16 | DataType::U16 => Some(2),
            DataType::I32 | DataType::U32 | DataType::F32 => Some(4),
            DataType::I64 | DataType::U64 | DataType::F64 => Some(8),
            DataType::Timestamp | DataType::Quality | DataType::ErrorCode => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Bool => "bool",
            DataType::I16 => "i16",
            DataType::U16 => "u16",
            DataType::I32 => "i32",
            DataType::U32 => "u32",
            DataType::I64 => "i64",
            DataType::U64 => "u64",
            DataType::F32 => "f32",
            DataType::F64 => "f64",
            DataType::Timestamp => "timestamp",
            DataType::Quality => "quality",
            DataType::ErrorCode => "errorCode",
        };
        f.write_str(name)
    }
}

/// 通过读句柄读取到的属性值
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataValue {
    Bool(bool),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Timestamp(Timestamp),
    Quality(Quality),
    ErrorCode(u32),
}

impl DataValue {
    pub fn data_type(&self) -> DataType {
        match self {
            DataValue::Bool(_) => DataType::Bool,
            DataValue::I16(_) => DataType::I16,
            DataValue::U16(_) => DataType::U16,
            DataValue::I32(_) => DataType::I32,
            DataValue::U32(_) => DataType::U32,
            DataValue::I64(_) => DataType::I64,
            DataValue::U64(_) => DataType::U64,
            DataValue::F32(_) => DataType::F32,
            DataValue::F64(_) => DataType::F64,
            DataValue::Timestamp(_) => DataType::Timestamp,
            DataValue::Quality(_) => DataType::Quality,
            DataValue::ErrorCode(_) => DataType::ErrorCode,
        }
    }

    /// 数值类属性转换为 `f64`（便于日志和比较）
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            DataValue::Bool(v) => Some(if v { 1.0 } else { 0.0 }),
            DataValue::I16(v) => Some(v as f64),
            DataValue::U16(v) => Some(v as f64),
            DataValue::I32(v) => Some(v as f64),
            DataValue::U32(v) => Some(v as f64),
            DataValue::I64(v) => Some(v as f64),
            DataValue::U64(v) => Some(v as f64),
            DataValue::F32(v) => Some(v as f64),
            DataValue::F64(v) => Some(v),
            DataValue::Timestamp(_) | DataValue::Quality(_) | DataValue::ErrorCode(_) => None,
        }
    }
}

/// 点值类型契约
///
/// 满足相等比较与默认构造（读取出错时写入默认值），
/// 并能与载荷中的定长大端切片互相转换。
///
/// **实时性**：实现类型应为定长、无堆分配的值（所有内置实现都是 `Copy`）。
pub trait PointValue: Clone + PartialEq + Default + Send + Sync + fmt::Debug + 'static {
    /// 对应的数据类型
    const DATA_TYPE: DataType;
    /// 在载荷中的字节宽度（不超过 [`MAX_VALUE_WIDTH`]）
    const WIDTH: usize;

    /// 从恰好 `WIDTH` 字节的切片解码；内容非法时返回 `None`
    fn decode(bytes: &[u8]) -> Option<Self>;

    /// 编码到恰好 `WIDTH` 字节的缓冲区
    fn encode(&self, out: &mut [u8]);

    /// 转换为属性值
    fn to_data_value(&self) -> DataValue;

    /// 从属性值还原；类型不符时返回 `None`（不做隐式数值转换）
    fn from_data_value(value: DataValue) -> Option<Self>;

    /// 在指定偏移处从载荷解码
    fn decode_at(payload: &[u8], offset: u32) -> Result<Self, IoError> {
        let start = offset as usize;
        let end = start + Self::WIDTH;
        let bytes = payload.get(start..end).ok_or(IoError::PayloadTooShort {
            offset,
            needed: Self::WIDTH as u32,
            available: payload.len() as u32,
        })?;
        Self::decode(bytes).ok_or(IoError::Decode {
            offset,
            len: Self::WIDTH as u32,
        })
    }
}

macro_rules! impl_numeric_point_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl PointValue for $ty {
                const DATA_TYPE: DataType = DataType::$variant;
                const WIDTH: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn decode(bytes: &[u8]) -> Option<Self> {
                    let raw: [u8; std::mem::size_of::<$ty>()] = bytes.try_into().ok()?;
                    Some(<$ty>::from_be_bytes(raw))
                }

                #[inline]
                fn encode(&self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_be_bytes());
                }

                #[inline]
                fn to_data_value(&self) -> DataValue {
                    DataValue::$variant(*self)
                }

                #[inline]
                fn from_data_value(value: DataValue) -> Option<Self> {
                    match value {
                        DataValue::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_numeric_point_value! {
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

impl PointValue for bool {
    const DATA_TYPE: DataType = DataType::Bool;
    const WIDTH: usize = 1;

    /// 只接受 `0`/`1`，其他取值视为解码错误
    #[inline]
    fn decode(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0] => Some(false),
            [1] => Some(true),
            _ => None,
        }
    }

    #[inline]
    fn encode(&self, out: &mut [u8]) {
        out[0] = u8::from(*self);
    }

    #[inline]
    fn to_data_value(&self) -> DataValue {
        DataValue::Bool(*self)
    }

    #[inline]
    fn from_data_value(value: DataValue) -> Option<Self> {
        match value {
            DataValue::Bool(v) => Some(v),
            _ => None,
        }
    }
}
