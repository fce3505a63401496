//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use pollbatch_sdk::prelude::*;
//! ```

// 批次与点
pub use crate::driver::{BatchRunner, Input, IoBatch, IoBatchBuilder, Output, PipelineConfig};
pub use crate::driver::{Directions, Point};

// 配置
pub use crate::driver::{BatchConfig, PointConfig};

// 事件与状态
pub use crate::driver::{CommonReadRecord, EventCallback, EventId, FiredEvent, ValueRecord, WriteRecord};

// 传输层
pub use crate::driver::IoTransport;
pub use crate::protocol::{ReadCommand, WriteCommand};

// 值与错误
pub use crate::driver::DriverError;
pub use crate::protocol::{DataType, DataValue, IoError, PointValue, Quality, Timestamp};
