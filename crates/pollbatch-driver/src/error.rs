//! 驱动层错误类型定义
//!
//! 周期内的读写错误是数据（[`IoError`] → 状态记录），不会出现在这里；
//! [`DriverError`] 只用于配置、查找、写入 API 和运行线程管理。

use crate::config::ConfigError;
use crate::point::Directions;
use pollbatch_protocol::{DataType, IoError};
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 读写错误（例如直接调用传输层时）
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// 同一批次中点名称重复
    #[error("Duplicate point name: {0}")]
    DuplicatePoint(String),

    /// 找不到点
    #[error("Unknown point: {0}")]
    UnknownPoint(String),

    /// 点的值类型与请求不符
    #[error("Type mismatch for point {point}: expected {expected}, found {actual}")]
    TypeMismatch {
        point: String,
        expected: DataType,
        actual: DataType,
    },

    /// 点的方向与请求不符（例如把输出当输入取）
    #[error("Point {point} has direction {actual:?}")]
    WrongDirection { point: String, actual: Directions },

    /// 点不可写
    #[error("Point is not writable: {0}")]
    NotWritable(String),

    /// IO 线程错误
    #[error("IO thread error: {0}")]
    IoThread(String),

    /// 无效输入
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_error_display() {
        let msg = DriverError::Io(IoError::NotConnected).to_string();
        assert!(msg.contains("Device not connected"), "{}", msg);

        let msg = DriverError::UnknownPoint("temp".to_string()).to_string();
        assert_eq!(msg, "Unknown point: temp");

        let msg = DriverError::TypeMismatch {
            point: "temp".to_string(),
            expected: DataType::F64,
            actual: DataType::U16,
        }
        .to_string();
        assert!(msg.contains("expected f64") && msg.contains("found u16"), "{}", msg);

        let msg = DriverError::IoThread("spawn failed".to_string()).to_string();
        assert!(msg.contains("IO thread") && msg.contains("spawn failed"));
    }

    #[test]
    fn test_from_io_error() {
        let err: DriverError = IoError::Transport(5).into();
        match err {
            DriverError::Io(IoError::Transport(code)) => assert_eq!(code, 5),
            other => panic!("Expected Io variant, got {:?}", other),
        }
    }

    #[test]
    fn test_from_config_error() {
        let err: DriverError = ConfigError::DuplicatePoint("a".to_string()).into();
        assert!(matches!(err, DriverError::Config(ConfigError::DuplicatePoint(_))));
    }
}
