//! # Pollbatch Protocol
//!
//! 批量轮询引擎的数据模型与命令载荷定义（无传输层依赖）
//!
//! ## 模块
//!
//! - `timestamp`: 微秒级时间戳
//! - `quality`: 数据质量（Good/Bad）
//! - `error`: 读写错误及错误码
//! - `value`: 点值类型与定长编解码
//! - `command`: 读命令、读载荷、写命令
//!
//! ## 字节序
//!
//! 点值在载荷中使用大端字节序（MSB 在前），与常见现场总线寄存器布局一致。
//! 具体的线上格式由传输层负责，本 crate 只定义"按偏移取定长切片"的契约。

pub mod command;
pub mod error;
pub mod quality;
pub mod timestamp;
pub mod value;

// 重新导出常用类型
pub use command::*;
pub use error::*;
pub use quality::*;
pub use timestamp::*;
pub use value::*;
