//! Pollbatch SDK - 批量轮询设备的 Rust SDK
//!
//! 把一组设备点合并成一个周期性读命令和一个按需写命令，
//! 以事务方式跟踪点值、质量、时间戳和错误码，并在提交后触发变化事件。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 时间戳、质量、错误码、点值编解码、命令载荷
//! - **驱动层** (`driver`): 数据块事务、状态跟踪、点、批次编排、运行线程
//!
//! # 快速开始
//!
//! ```rust
//! use pollbatch_sdk::prelude::*;
//!
//! # fn main() -> Result<(), DriverError> {
//! let config = BatchConfig::from_toml_str(
//!     r#"
//!     name = "plc"
//!
//!     [[point]]
//!     name = "temperature"
//!     data_type = "f32"
//!     offset = 0
//!     "#,
//! )?;
//! let builder = IoBatchBuilder::from_config(&config)?;
//! # let _ = builder;
//! # Ok(())
//! # }
//! ```
//!
//! 传输层通过实现 [`IoTransport`] 接入，批次用 [`BatchRunner`] 周期运行。

pub use pollbatch_driver as driver;
pub use pollbatch_protocol as protocol;

pub mod prelude;

// --- 用户以此为界 ---
// 以下是通过 Facade Pattern 提供的公共 API

// 协议层常用类型
pub use protocol::{DataType, DataValue, IoError, PointValue, Quality, Timestamp};

// 驱动层
pub use driver::{
    BatchConfig, BatchRunner, DriverError, EventCallback, FiredEvent, Input, IoBatch, IoBatchBuilder,
    IoTransport, Output, PipelineConfig,
};

use tracing_subscriber::EnvFilter;

/// 未设置 `RUST_LOG` 时使用的过滤规则
const DEFAULT_LOG_FILTER: &str = "pollbatch_driver=info,pollbatch_sdk=info";

/// 初始化日志（`tracing-subscriber` fmt 输出，`RUST_LOG` 控制过滤）
///
/// 同时把 `log` crate 的记录桥接到 `tracing`。重复调用时静默忽略。
pub fn init_logging() {
    let _ = try_init_logging();
}

/// 同 [`init_logging`]，但返回安装失败的原因（例如已有全局 subscriber）
pub fn try_init_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_log::LogTracer::init()?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        assert!(try_init_logging().is_err());
    }
}
