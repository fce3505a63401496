//! 读写错误定义
//!
//! 这些错误是**数据**而不是异常：它们作为 `Result` 沿着更新链流动，
//! 最终以错误码的形式写进状态记录，永远不会中断一个周期。

use thiserror::Error;

/// 状态记录中保存的错误码，`0` 表示无错误
pub type ErrorCode = u32;

/// 无错误
pub const NO_ERROR: ErrorCode = 0;

/// 传输层错误码的标志位（低 31 位保留传输层原始码）
const TRANSPORT_FLAG: ErrorCode = 0x8000_0000;

/// 读写周期中的错误
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoError {
    /// 设备不在运行状态（由批次自身合成，不经过传输层）
    #[error("Device not connected")]
    NotConnected,

    /// 尚未读到任何数据（状态记录的初始错误）
    #[error("No data has been read yet")]
    NoData,

    /// 载荷长度不足以覆盖点的切片
    #[error("Payload too short: need {needed} bytes at offset {offset}, have {available}")]
    PayloadTooShort {
        offset: u32,
        needed: u32,
        available: u32,
    },

    /// 切片内容无法解码为点值
    #[error("Invalid {len}-byte value at offset {offset}")]
    Decode { offset: u32, len: u32 },

    /// 传输层返回的原始错误码
    ///
    /// 只有低 31 位进入状态记录：最高位被 [`IoError::code`] 用作标志位，
    /// 设置了最高位的错误码经 [`IoError::from_code`] 还原后会丢失这一位。
    #[error("Transport error (code {0})")]
    Transport(u32),
}

impl IoError {
    /// 转换为状态记录中的错误码
    ///
    /// 传输层错误码保留低 31 位并加上标志位，保证不与内部错误冲突。
    pub fn code(&self) -> ErrorCode {
        match self {
            IoError::NotConnected => 1,
            IoError::NoData => 2,
            IoError::PayloadTooShort { .. } => 3,
            IoError::Decode { .. } => 4,
            IoError::Transport(code) => TRANSPORT_FLAG | (code & !TRANSPORT_FLAG),
        }
    }

    /// 从错误码还原（切片信息无法还原，字段置 0）
    pub fn from_code(code: ErrorCode) -> Option<IoError> {
        match code {
            NO_ERROR => None,
            1 => Some(IoError::NotConnected),
            2 => Some(IoError::NoData),
            3 => Some(IoError::PayloadTooShort {
                offset: 0,
                needed: 0,
                available: 0,
            }),
            4 => Some(IoError::Decode { offset: 0, len: 0 }),
            c if c & TRANSPORT_FLAG != 0 => Some(IoError::Transport(c & !TRANSPORT_FLAG)),
            c => Some(IoError::Transport(c)),
        }
    }
}

/// 把一次操作的结果折叠成错误码
#[inline]
pub fn error_code(outcome: Result<(), IoError>) -> ErrorCode {
    match outcome {
        Ok(()) => NO_ERROR,
        Err(e) => e.code(),
    }
}
