//! Builder 模式实现
//!
//! 点只能在构建阶段挂载：[`IoBatchBuilder::build`] 消耗 builder，
//! 封存两个数据块和事件表，之后批次的布局不再变化。
//!
//! # Example
//!
//! ```
//! use pollbatch_driver::{IoBatchBuilder, IoTransport};
//! use pollbatch_protocol::{IoError, ReadCommand, Timestamp, WriteCommand};
//!
//! struct Offline;
//!
//! impl IoTransport for Offline {
//!     fn is_operational(&self) -> bool {
//!         false
//!     }
//!     fn read(&self, _: &mut ReadCommand) -> Result<(), IoError> {
//!         Err(IoError::NotConnected)
//!     }
//!     fn write(&self, _: &WriteCommand) -> Result<(), IoError> {
//!         Err(IoError::NotConnected)
//!     }
//! }
//!
//! let mut builder = IoBatchBuilder::new("plc");
//! let temperature = builder.add_input::<f64>("temperature", 0).unwrap();
//! let setpoint = builder.add_output::<u16>("setpoint", 8).unwrap();
//! let batch = builder.build(Offline);
//!
//! setpoint.write_value(42);
//! let report = batch.write(Timestamp::now());
//! assert_eq!(report.outcome, Some(Err(IoError::NotConnected)));
//!
//! batch.read(Timestamp::now());
//! assert_eq!(temperature.value(), 0.0);
//! assert!(!batch.common_state().quality.is_good());
//! ```

use crate::batch::{BatchParts, IoBatch, PointEntry};
use crate::config::{BatchConfig, ConfigError, PointConfig};
use crate::data_block::DataBlock;
use crate::error::DriverError;
use crate::event::EventTable;
use crate::metrics::BatchMetrics;
use crate::point::{AbstractInput, AbstractOutput, Attachment, Input, Output, Point};
use crate::registry::{ClassRegistry, ElementKind};
use crate::state::{CommonReadState, WriteState};
use crate::transport::IoTransport;
use crossbeam_channel::{Receiver, Sender, bounded};
use pollbatch_protocol::{DataType, PointValue};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// 批次 Builder
pub struct IoBatchBuilder {
    name: Arc<str>,
    read_block: Arc<DataBlock>,
    write_block: Arc<DataBlock>,
    event_table: EventTable,
    common: CommonReadState,
    write_state: WriteState,
    inputs: Vec<Arc<dyn AbstractInput>>,
    outputs: Vec<Arc<dyn AbstractOutput>>,
    points: Vec<PointEntry>,
    index: HashMap<Arc<str>, usize>,
    metrics: Arc<BatchMetrics>,
    write_trigger: (Sender<()>, Receiver<()>),
}

impl IoBatchBuilder {
    /// 创建空批次；批次自身的读写状态与事件在此注册
    pub fn new(name: &str) -> Self {
        let name: Arc<str> = Arc::from(name);
        let read_block = Arc::new(DataBlock::new("read"));
        let write_block = Arc::new(DataBlock::new("write"));
        let event_table = EventTable::new();
        let common = CommonReadState::attach(&read_block, &event_table, &name);
        let write_state = WriteState::attach(&write_block, &event_table, &name);

        Self {
            name,
            read_block,
            write_block,
            event_table,
            common,
            write_state,
            inputs: Vec::new(),
            outputs: Vec::new(),
            points: Vec::new(),
            index: HashMap::new(),
            metrics: Arc::new(BatchMetrics::new()),
            // 容量 1：多次唤醒合并为一次
            write_trigger: bounded(1),
        }
    }

    /// 按配置创建 builder 并挂载全部点（使用进程级注册表）
    pub fn from_config(config: &BatchConfig) -> Result<Self, DriverError> {
        Self::from_config_with(config, ClassRegistry::global())
    }

    pub fn from_config_with(config: &BatchConfig, registry: &ClassRegistry) -> Result<Self, DriverError> {
        config.validate_with(registry)?;
        let mut builder = Self::new(&config.name);
        for point in &config.points {
            builder.add_point_with(point, registry)?;
        }
        Ok(builder)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 已挂载的点数
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 挂载输入点
    pub fn add_input<T: PointValue>(&mut self, name: &str, offset: u32) -> Result<Arc<Input<T>>, DriverError> {
        let name = self.claim_name(name)?;
        check_offset::<T>(&name, offset)?;
        let input = Arc::new(Input::<T>::attach(
            Arc::clone(&name),
            offset,
            &self.read_block,
            &self.event_table,
        ));
        debug!(
            "Batch {}: input {} ({}) attached at offset {}",
            self.name,
            name,
            T::DATA_TYPE,
            offset
        );

        self.inputs.push(input.clone());
        self.register(name, input.clone(), None, input.clone());
        Ok(input)
    }

    /// 挂载输出点
    pub fn add_output<T: PointValue>(&mut self, name: &str, offset: u32) -> Result<Arc<Output<T>>, DriverError> {
        self.attach_output(name, offset, false)
    }

    /// 挂载带回读的输出点（同时参与读周期）
    pub fn add_readback_output<T: PointValue>(
        &mut self,
        name: &str,
        offset: u32,
    ) -> Result<Arc<Output<T>>, DriverError> {
        self.attach_output(name, offset, true)
    }

    /// 按配置挂载一个点（使用进程级注册表解析类名）
    pub fn add_point(&mut self, config: &PointConfig) -> Result<(), DriverError> {
        self.add_point_with(config, ClassRegistry::global())
    }

    pub fn add_point_with(&mut self, config: &PointConfig, registry: &ClassRegistry) -> Result<(), DriverError> {
        let kind = config.kind(registry)?;
        if kind == ElementKind::Input && config.readback {
            return Err(ConfigError::InvalidReadback(config.name.clone()).into());
        }

        match config.data_type {
            DataType::Bool => self.add_typed::<bool>(config, kind),
            DataType::I16 => self.add_typed::<i16>(config, kind),
            DataType::U16 => self.add_typed::<u16>(config, kind),
            DataType::I32 => self.add_typed::<i32>(config, kind),
            DataType::U32 => self.add_typed::<u32>(config, kind),
            DataType::I64 => self.add_typed::<i64>(config, kind),
            DataType::U64 => self.add_typed::<u64>(config, kind),
            DataType::F32 => self.add_typed::<f32>(config, kind),
            DataType::F64 => self.add_typed::<f64>(config, kind),
            DataType::Timestamp | DataType::Quality | DataType::ErrorCode => Err(ConfigError::UnsupportedType {
                point: config.name.clone(),
                data_type: config.data_type,
            }
            .into()),
        }
    }

    /// 封存布局并创建批次
    pub fn build<D: IoTransport>(self, transport: D) -> IoBatch<D> {
        self.read_block.realize();
        self.write_block.realize();
        self.event_table.seal();
        info!(
            "Batch {}: built with {} inputs, {} outputs, {} events",
            self.name,
            self.inputs.len(),
            self.outputs.len(),
            self.event_table.len()
        );

        let parts = BatchParts {
            name: self.name,
            read_block: self.read_block,
            write_block: self.write_block,
            event_table: self.event_table,
            common: self.common,
            write_state: self.write_state,
            inputs: self.inputs,
            outputs: self.outputs,
            points: self.points,
            index: self.index,
            metrics: self.metrics,
            write_trigger: self.write_trigger,
        };
        IoBatch::from_parts(parts, transport)
    }

    fn add_typed<T: PointValue>(&mut self, config: &PointConfig, kind: ElementKind) -> Result<(), DriverError> {
        match kind {
            ElementKind::Input => self.add_input::<T>(&config.name, config.offset).map(drop),
            _ => self.attach_output::<T>(&config.name, config.offset, config.readback).map(drop),
        }
    }

    fn attach_output<T: PointValue>(
        &mut self,
        name: &str,
        offset: u32,
        readback: bool,
    ) -> Result<Arc<Output<T>>, DriverError> {
        let name = self.claim_name(name)?;
        check_offset::<T>(&name, offset)?;
        let ctx = Attachment {
            read_block: &self.read_block,
            write_block: &self.write_block,
            events: &self.event_table,
            write_trigger: &self.write_trigger.0,
            metrics: &self.metrics,
        };
        let output = Arc::new(Output::<T>::attach(Arc::clone(&name), offset, readback, &ctx));
        debug!(
            "Batch {}: output {} ({}) attached at offset {}{}",
            self.name,
            name,
            T::DATA_TYPE,
            offset,
            if readback { " with readback" } else { "" }
        );

        self.outputs.push(output.clone());
        if readback {
            self.inputs.push(output.clone());
        }
        self.register(name, output.clone(), Some(output.clone()), output.clone());
        Ok(output)
    }

    fn claim_name(&self, name: &str) -> Result<Arc<str>, DriverError> {
        if name.is_empty() {
            return Err(DriverError::InvalidInput("point name must not be empty".to_string()));
        }
        if self.index.contains_key(name) {
            return Err(DriverError::DuplicatePoint(name.to_string()));
        }
        Ok(Arc::from(name))
    }

    fn register(
        &mut self,
        name: Arc<str>,
        point: Arc<dyn Point>,
        output: Option<Arc<dyn AbstractOutput>>,
        any: Arc<dyn Any + Send + Sync>,
    ) {
        self.index.insert(name, self.points.len());
        self.points.push(PointEntry { point, output, any });
    }
}

/// 点的字节区间必须落在 32 位地址空间内
fn check_offset<T: PointValue>(name: &str, offset: u32) -> Result<(), ConfigError> {
    let width = T::WIDTH as u32;
    match offset.checked_add(width) {
        Some(_) => Ok(()),
        None => Err(ConfigError::OffsetOutOfRange {
            point: name.to_string(),
            offset,
            width,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::point::Directions;

    #[test]
    fn test_duplicate_and_empty_names() {
        let mut builder = IoBatchBuilder::new("b");
        builder.add_input::<u16>("a", 0).unwrap();
        assert!(matches!(
            builder.add_output::<u16>("a", 2),
            Err(DriverError::DuplicatePoint(name)) if name == "a"
        ));
        assert!(matches!(
            builder.add_input::<u16>("", 2),
            Err(DriverError::InvalidInput(_))
        ));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_event_registration() {
        let mut builder = IoBatchBuilder::new("b");
        builder.add_input::<u16>("in", 0).unwrap();
        builder.add_output::<u16>("out", 0).unwrap();
        builder.add_readback_output::<u16>("rb", 2).unwrap();
        // 批次 4 个 + 输入 2 个 + 输出 2 个 + 回读输出 4 个
        assert_eq!(builder.event_table.len(), 12);

        let batch = builder.build(MockTransport::new(4));
        assert!(batch.event_table().is_sealed());
        assert_eq!(batch.input_count(), 2);
        assert_eq!(batch.output_count(), 2);
    }

    #[test]
    fn test_from_config() {
        let mut config = BatchConfig::new("plc");
        config.points.push(PointConfig::input("temp", DataType::F32, 0));
        config.points.push(PointConfig::output("valve", DataType::Bool, 4, true));
        config.points.push(PointConfig::output("speed", DataType::I32, 8, false));

        let batch = IoBatchBuilder::from_config(&config).unwrap().build(MockTransport::new(12));
        assert_eq!(batch.name(), "plc");
        assert_eq!(batch.point("temp").unwrap().directions(), Directions::Input);
        assert_eq!(batch.point("valve").unwrap().directions(), Directions::InputOutput);
        assert_eq!(batch.point("speed").unwrap().data_type(), DataType::I32);
        assert!(batch.input::<f32>("temp").is_ok());
        assert!(batch.output::<bool>("valve").is_ok());
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let mut config = BatchConfig::new("plc");
        config.points.push(PointConfig::input("a", DataType::U32, 0));
        config.points.push(PointConfig::input("b", DataType::U32, 2));
        assert!(matches!(
            IoBatchBuilder::from_config(&config),
            Err(DriverError::Config(ConfigError::Overlap { .. }))
        ));
    }

    #[test]
    fn test_offset_past_address_space_is_rejected() {
        let mut builder = IoBatchBuilder::new("b");
        assert!(matches!(
            builder.add_input::<f64>("far", u32::MAX - 5),
            Err(DriverError::Config(ConfigError::OffsetOutOfRange { .. }))
        ));
        assert!(matches!(
            builder.add_readback_output::<u32>("far", u32::MAX),
            Err(DriverError::Config(ConfigError::OffsetOutOfRange { .. }))
        ));
        assert!(builder.is_empty());

        // 被拒绝的名称仍可再次使用
        builder.add_input::<u16>("far", 0).unwrap();
        let batch = builder.build(MockTransport::new(2));
        assert_eq!(batch.read(pollbatch_protocol::Timestamp::from_micros(1)).outcome, Ok(()));
    }

    #[test]
    fn test_add_point_rejects_attribute_types() {
        let mut builder = IoBatchBuilder::new("b");
        let point = PointConfig::input("q", DataType::Quality, 0);
        assert!(matches!(
            builder.add_point(&point),
            Err(DriverError::Config(ConfigError::UnsupportedType { .. }))
        ));

        let mut point = PointConfig::input("i", DataType::U16, 0);
        point.readback = true;
        assert!(matches!(
            builder.add_point(&point),
            Err(DriverError::Config(ConfigError::InvalidReadback(_)))
        ));
        assert!(builder.is_empty());
    }
}
