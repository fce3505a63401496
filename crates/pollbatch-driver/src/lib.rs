//! 驱动层模块
//!
//! 批量轮询引擎的核心：把一组点合并成一个周期性读命令和一个按需写命令，
//! 以事务方式更新点和批次的状态，并在提交后触发事件。包括：
//! - 双缓冲数据块（[`DataBlock`] + [`WriteSentinel`]，全有或全无的提交）
//! - 单槽待写队列（[`SingleValueQueue`]，无锁、最新值优先）
//! - 状态跟踪（公共读状态、逐点值状态、写状态）
//! - 点抽象（[`Input`]、[`Output`]，可选回读）
//! - 批次编排（[`IoBatch`]：读周期与写周期）
//! - 事件表与钩子（[`EventTable`]、[`EventCallback`]、[`EventRecorder`]）
//! - 配置、元素类注册表、运行线程与指标
//!
//! # 使用场景
//!
//! 实现 [`IoTransport`] 接入具体设备，用 [`IoBatchBuilder`] 挂载点，
//! 再交给 [`BatchRunner`] 周期运行或直接调用 [`IoBatch::read`] / [`IoBatch::write`]。

pub mod attribute;
mod batch;
mod builder;
pub mod config;
pub mod data_block;
mod error;
pub mod event;
pub mod metrics;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod pipeline;
pub mod point;
pub mod queue;
pub mod read_handle;
pub mod registry;
mod runner;
pub mod state;
pub mod transport;

pub use attribute::{Access, Attribute};
pub use batch::{IoBatch, ReadReport, WriteReport};
pub use builder::IoBatchBuilder;
pub use config::{BatchConfig, ConfigError, PointConfig};
pub use data_block::{DataBlock, ObjectHandle, Record, WriteSentinel};
pub use error::DriverError;
pub use event::{EventCallback, EventId, EventRecorder, EventTable, FiredEvent, PendingEventList, RecordedEvent};
pub use metrics::{BatchMetrics, MetricsSnapshot};
pub use pipeline::{PipelineConfig, read_loop, write_loop};
pub use point::{AbstractInput, AbstractOutput, Directions, Input, Output, Point};
pub use queue::SingleValueQueue;
pub use read_handle::{ReadHandle, ReadHandleError};
pub use registry::{ClassRegistry, ElementClass, ElementKind};
pub use runner::BatchRunner;
pub use state::*;
pub use transport::IoTransport;
