//! 批次编排器
//!
//! [`IoBatch`] 持有点列表、读写命令、两个数据块和事件表，执行读周期与写周期。
//!
//! # 读周期
//!
//! ```text
//! 设备离线 ──────────────────────────────┐
//!    │在线                                ▼
//! 构造读命令（仅第一次）→ transport.read → 打开读事务
//!                                         │ 公共状态（得到 Changes）
//!                                         │ 各输入点（挂载顺序）
//!                                         ▼
//!                                       commit → 触发事件
//! ```
//!
//! # 写周期
//!
//! 清空写命令 → 各输出点依次取待写值 → 没有待写值则空周期（不调用传输层）
//! → transport.write（离线时为 `NotConnected`）→ 打开写事务，只更新本周期
//! 参与写出的输出 → commit → 触发事件。
//!
//! 两个周期各自串行（各有一把运行时锁），彼此可以并发：读写数据块互不相交。
//! 周期内不分配内存：事件列表、待通知列表、写命令、读载荷都在构建时按最坏情况预分配。

use crate::attribute::Attribute;
use crate::data_block::DataBlock;
use crate::error::DriverError;
use crate::event::{EventCallback, EventId, EventTable, PendingEventList};
use crate::metrics::BatchMetrics;
use crate::point::{AbstractInput, AbstractOutput, Input, Output, Point};
use crate::read_handle::{ReadHandle, ReadHandleError};
use crate::state::{Changes, CommonReadRecord, CommonReadState, WriteRecord, WriteState};
use crate::transport::IoTransport;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use pollbatch_protocol::{DataType, DataValue, IoError, PointValue, ReadCommand, ReadPayload, Timestamp, WriteCommand};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace, warn};

/// 已挂载的点
pub(crate) struct PointEntry {
    pub point: Arc<dyn Point>,
    pub output: Option<Arc<dyn AbstractOutput>>,
    pub any: Arc<dyn Any + Send + Sync>,
}

impl PointEntry {
    fn mismatch(&self, expected: DataType) -> DriverError {
        if self.point.data_type() != expected {
            DriverError::TypeMismatch {
                point: self.point.name().to_string(),
                expected,
                actual: self.point.data_type(),
            }
        } else {
            DriverError::WrongDirection {
                point: self.point.name().to_string(),
                actual: self.point.directions(),
            }
        }
    }
}

/// 批次构建完成后交给 [`IoBatch`] 的全部部件
pub(crate) struct BatchParts {
    pub name: Arc<str>,
    pub read_block: Arc<DataBlock>,
    pub write_block: Arc<DataBlock>,
    pub event_table: EventTable,
    pub common: CommonReadState,
    pub write_state: WriteState,
    pub inputs: Vec<Arc<dyn AbstractInput>>,
    pub outputs: Vec<Arc<dyn AbstractOutput>>,
    pub points: Vec<PointEntry>,
    pub index: HashMap<Arc<str>, usize>,
    pub metrics: Arc<BatchMetrics>,
    pub write_trigger: (Sender<()>, Receiver<()>),
}

struct ReadRuntime {
    /// 第一次在线读周期时构造，之后复用
    command: Option<ReadCommand>,
    events: PendingEventList,
}

struct WriteRuntime {
    command: WriteCommand,
    events: PendingEventList,
    /// 本周期参与写出的输出下标
    pending: Vec<usize>,
}

/// 一次读周期的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadReport {
    /// 批次读取结果（已写入公共状态）
    pub outcome: Result<(), IoError>,
    pub changes: Changes,
    /// 本周期触发的事件数
    pub events: usize,
}

/// 一次写周期的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    /// 本周期写出的输出数量
    pub outputs: usize,
    /// 写出结果；空周期为 `None`
    pub outcome: Option<Result<(), IoError>>,
    pub events: usize,
}

impl WriteReport {
    const IDLE: WriteReport = WriteReport {
        outputs: 0,
        outcome: None,
        events: 0,
    };

    /// 没有任何待写值（未调用传输层）
    pub fn is_idle(&self) -> bool {
        self.outcome.is_none()
    }
}

/// I/O 批次
pub struct IoBatch<D: IoTransport> {
    name: Arc<str>,
    transport: D,
    read_block: Arc<DataBlock>,
    write_block: Arc<DataBlock>,
    event_table: EventTable,
    common: CommonReadState,
    write_state: WriteState,
    inputs: Vec<Arc<dyn AbstractInput>>,
    outputs: Vec<Arc<dyn AbstractOutput>>,
    points: Vec<PointEntry>,
    index: HashMap<Arc<str>, usize>,
    read_runtime: Mutex<ReadRuntime>,
    write_runtime: Mutex<WriteRuntime>,
    operational: AtomicBool,
    metrics: Arc<BatchMetrics>,
    write_trigger_tx: Sender<()>,
    write_trigger_rx: Receiver<()>,
}

impl<D: IoTransport> IoBatch<D> {
    pub(crate) fn from_parts(parts: BatchParts, transport: D) -> Self {
        let BatchParts {
            name,
            read_block,
            write_block,
            event_table,
            common,
            write_state,
            inputs,
            outputs,
            points,
            index,
            metrics,
            write_trigger: (write_trigger_tx, write_trigger_rx),
        } = parts;

        // 每个事件在一个周期内最多追加一次，事件总数就是最坏情况
        let event_count = event_table.len();
        let read_runtime = ReadRuntime {
            command: None,
            events: PendingEventList::with_capacity(event_count),
        };
        let write_runtime = WriteRuntime {
            command: WriteCommand::with_capacity(outputs.len()),
            events: PendingEventList::with_capacity(event_count),
            pending: Vec::with_capacity(outputs.len()),
        };

        Self {
            name,
            transport,
            read_block,
            write_block,
            event_table,
            common,
            write_state,
            inputs,
            outputs,
            points,
            index,
            read_runtime: Mutex::new(read_runtime),
            write_runtime: Mutex::new(write_runtime),
            operational: AtomicBool::new(false),
            metrics,
            write_trigger_tx,
            write_trigger_rx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transport(&self) -> &D {
        &self.transport
    }

    pub fn metrics(&self) -> &Arc<BatchMetrics> {
        &self.metrics
    }

    pub fn event_table(&self) -> &EventTable {
        &self.event_table
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    // ============================================================
    // 读周期
    // ============================================================

    /// 执行一次读周期
    ///
    /// 不会失败：传输层错误和设备离线都作为数据写入公共状态与各点状态。
    pub fn read(&self, timestamp: Timestamp) -> ReadReport {
        let mut runtime = self.read_runtime.lock();
        let ReadRuntime { command, events } = &mut *runtime;
        self.metrics.read_cycles.fetch_add(1, Ordering::Relaxed);

        let operational = self.transport.is_operational();
        self.track_operational(operational);

        let payload = if operational {
            let command = command.get_or_insert_with(|| self.build_read_command());
            match self.transport.read(command) {
                Ok(()) => Ok(command.payload()),
                Err(e) => {
                    self.metrics.read_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("Batch {}: read failed: {}", self.name, e);
                    Err(e)
                },
            }
        } else {
            self.metrics.invalidations.fetch_add(1, Ordering::Relaxed);
            Err(IoError::NotConnected)
        };

        self.run_read_transaction(timestamp, payload, events)
    }

    /// 不访问设备，直接以 `NotConnected` 使所有输入失效
    pub fn invalidate(&self, timestamp: Timestamp) -> ReadReport {
        let mut runtime = self.read_runtime.lock();
        self.metrics.invalidations.fetch_add(1, Ordering::Relaxed);
        self.run_read_transaction(timestamp, Err(IoError::NotConnected), &mut runtime.events)
    }

    fn run_read_transaction(
        &self,
        timestamp: Timestamp,
        payload: Result<&ReadPayload, IoError>,
        events: &mut PendingEventList,
    ) -> ReadReport {
        events.clear();
        let outcome = payload.map(|_| ());

        let mut sentinel = self.read_block.write_sentinel();
        let changes = self.common.update(&mut sentinel, timestamp, outcome, events);
        for input in &self.inputs {
            input.update_read_state(&mut sentinel, timestamp, payload, changes, events);
        }
        sentinel.commit();

        self.fire(events, timestamp);
        trace!(
            "Batch {}: read cycle done ({:?}, {} events)",
            self.name,
            outcome,
            events.len()
        );
        ReadReport {
            outcome,
            changes,
            events: events.len(),
        }
    }

    fn build_read_command(&self) -> ReadCommand {
        let mut command = ReadCommand::with_capacity(self.inputs.len());
        for input in &self.inputs {
            input.add_to_read_command(&mut command);
        }
        command.finish();
        debug!(
            "Batch {}: read command built ({} ranges, {} bytes)",
            self.name,
            command.ranges().len(),
            command.span()
        );
        command
    }

    fn track_operational(&self, operational: bool) {
        let previous = self.operational.swap(operational, Ordering::AcqRel);
        if previous && !operational {
            warn!("Batch {}: device is no longer operational, invalidating inputs", self.name);
        } else if !previous && operational {
            info!("Batch {}: device is operational", self.name);
        }
    }

    // ============================================================
    // 写周期
    // ============================================================

    /// 执行一次写周期
    ///
    /// 没有任何待写值时是空操作：不调用传输层，不修改状态，不触发事件。
    pub fn write(&self, timestamp: Timestamp) -> WriteReport {
        let mut runtime = self.write_runtime.lock();
        let WriteRuntime {
            command,
            events,
            pending,
        } = &mut *runtime;
        command.clear();
        events.clear();
        pending.clear();

        for (index, output) in self.outputs.iter().enumerate() {
            if output.add_to_write_command(command) {
                pending.push(index);
            }
        }
        if pending.is_empty() {
            return WriteReport::IDLE;
        }
        self.metrics.write_cycles.fetch_add(1, Ordering::Relaxed);

        let outcome = if self.transport.is_operational() {
            self.transport.write(command)
        } else {
            Err(IoError::NotConnected)
        };
        if let Err(e) = outcome {
            self.metrics.write_errors.fetch_add(1, Ordering::Relaxed);
            warn!(
                "Batch {}: write of {} outputs failed: {}",
                self.name,
                pending.len(),
                e
            );
        }

        let mut sentinel = self.write_block.write_sentinel();
        self.write_state.update(&mut sentinel, timestamp, outcome, events);
        for &index in pending.iter() {
            self.outputs[index].update_write_state(&mut sentinel, timestamp, outcome, events);
        }
        sentinel.commit();

        self.fire(events, timestamp);
        WriteReport {
            outputs: pending.len(),
            outcome: Some(outcome),
            events: events.len(),
        }
    }

    /// 唤醒写线程（由 [`BatchRunner`](crate::BatchRunner) 消费）
    pub fn trigger_write(&self) {
        let _ = self.write_trigger_tx.try_send(());
    }

    pub(crate) fn write_trigger(&self) -> &Receiver<()> {
        &self.write_trigger_rx
    }

    fn fire(&self, events: &PendingEventList, timestamp: Timestamp) {
        self.event_table.fire_all(events, timestamp);
        self.metrics
            .events_fired
            .fetch_add(events.len() as u64, Ordering::Relaxed);
    }

    // ============================================================
    // 属性、事件与点的解析
    // ============================================================

    /// 批次级属性：`updateTime`、`quality`、`error`、`writeTime`、`writeError`
    pub fn resolve_attribute(&self, name: &str) -> Option<Attribute> {
        self.common
            .resolve_attribute(name)
            .or_else(|| self.write_state.resolve_attribute(name))
    }

    /// 批次级事件：`read`、`quality`、`written`、`writeError`
    pub fn resolve_event(&self, name: &str) -> Option<EventId> {
        self.common
            .resolve_event(name)
            .or_else(|| self.write_state.resolve_event(name))
    }

    pub fn read_handle(&self, attribute: &Attribute) -> Result<ReadHandle, ReadHandleError> {
        match self.common.read_handle(attribute) {
            Err(ReadHandleError::UnknownAttribute(_)) => self.write_state.read_handle(attribute),
            other => other,
        }
    }

    /// 已提交的公共读状态
    pub fn common_state(&self) -> CommonReadRecord {
        self.common.current()
    }

    /// 已提交的批次写状态
    pub fn last_write(&self) -> WriteRecord {
        self.write_state.current()
    }

    pub fn common_read_state(&self) -> &CommonReadState {
        &self.common
    }

    pub fn write_state(&self) -> &WriteState {
        &self.write_state
    }

    fn entry(&self, name: &str) -> Result<&PointEntry, DriverError> {
        self.index
            .get(name)
            .map(|&i| &self.points[i])
            .ok_or_else(|| DriverError::UnknownPoint(name.to_string()))
    }

    /// 按名称查找点
    pub fn point(&self, name: &str) -> Option<&Arc<dyn Point>> {
        self.entry(name).ok().map(|entry| &entry.point)
    }

    /// 按挂载顺序遍历所有点
    pub fn points(&self) -> impl Iterator<Item = &Arc<dyn Point>> {
        self.points.iter().map(|entry| &entry.point)
    }

    /// 取得类型化的输入点
    pub fn input<T: PointValue>(&self, name: &str) -> Result<Arc<Input<T>>, DriverError> {
        let entry = self.entry(name)?;
        Arc::clone(&entry.any)
            .downcast::<Input<T>>()
            .map_err(|_| entry.mismatch(T::DATA_TYPE))
    }

    /// 取得类型化的输出点
    pub fn output<T: PointValue>(&self, name: &str) -> Result<Arc<Output<T>>, DriverError> {
        let entry = self.entry(name)?;
        Arc::clone(&entry.any)
            .downcast::<Output<T>>()
            .map_err(|_| entry.mismatch(T::DATA_TYPE))
    }

    /// 以动态类型的值写入一个输出点
    pub fn write_value(&self, name: &str, value: DataValue) -> Result<(), DriverError> {
        let entry = self.entry(name)?;
        match &entry.output {
            Some(output) => output.write_data_value(value),
            None => Err(DriverError::NotWritable(name.to_string())),
        }
    }

    /// 按 `点名/事件名` 或批次事件名解析事件
    ///
    /// `"quality"` 解析为批次事件，`"temp/changed"` 解析为点 `temp` 的事件。
    pub fn find_event(&self, path: &str) -> Result<EventId, DriverError> {
        let resolved = match path.split_once('/') {
            Some((point, event)) => self.entry(point)?.point.resolve_event(event),
            None => self.resolve_event(path),
        };
        resolved.ok_or_else(|| DriverError::InvalidInput(format!("unknown event: {}", path)))
    }

    /// 订阅单个事件
    pub fn subscribe(&self, event: EventId, callback: Arc<dyn EventCallback>) {
        self.event_table.subscribe(event, callback);
    }

    /// 添加接收全部事件的钩子
    pub fn add_hook(&self, callback: Arc<dyn EventCallback>) {
        self.event_table.add_hook(callback);
    }
}

impl<D: IoTransport> fmt::Debug for IoBatch<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoBatch")
            .field("name", &self.name)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("events", &self.event_table.len())
            .finish_non_exhaustive()
    }
}
