//! 试运行命令
//!
//! 用配置构建批次，接到内存设备上，手动执行若干个读写周期并打印事件。

use super::{parse_value, split_assignment};
use anyhow::{Context, Result, bail};
use clap::Args;
use pollbatch_driver::mock::MockTransport;
use pollbatch_sdk::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;

/// 试运行命令参数
#[derive(Args, Debug)]
pub struct SimulateCommand {
    /// 批次配置文件（TOML）
    pub config: PathBuf,

    /// 执行的周期数（每个周期先写后读）
    #[arg(short, long, default_value_t = 1)]
    pub cycles: u32,

    /// 写入输出点，格式 `name=value`（可重复）
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub writes: Vec<String>,

    /// 预置设备映像中某个点的值，格式 `name=value`（可重复）
    #[arg(long = "device", value_name = "NAME=VALUE")]
    pub device: Vec<String>,

    /// 模拟设备离线
    #[arg(long)]
    pub offline: bool,
}

/// 打印事件的钩子
struct PrintHook;

impl EventCallback for PrintHook {
    fn on_event(&self, event: &FiredEvent<'_>) {
        println!("    {}.{} @ {} us", event.owner, event.name, event.timestamp.as_micros());
    }
}

impl SimulateCommand {
    pub fn execute(&self) -> Result<()> {
        let config = BatchConfig::load_from_file(&self.config)
            .with_context(|| format!("invalid configuration {}", self.config.display()))?;

        let transport = Arc::new(MockTransport::new(image_len(&config)));
        transport.set_operational(!self.offline);
        for assignment in &self.device {
            let (name, text) = split_assignment(assignment)?;
            let point = find_point(&config, name)?;
            let value = parse_value(point.data_type, text)?;
            preset(&transport, point.offset, value);
        }

        let batch = IoBatchBuilder::from_config(&config)?.build(Arc::clone(&transport));
        batch.add_hook(Arc::new(PrintHook));

        for assignment in &self.writes {
            let (name, text) = split_assignment(assignment)?;
            let point = find_point(&config, name)?;
            batch.write_value(name, parse_value(point.data_type, text)?)?;
        }

        for cycle in 1..=self.cycles {
            println!("cycle {}:", cycle);
            let timestamp = Timestamp::now();
            let write = batch.write(timestamp);
            if !write.is_idle() {
                println!("  write: {} outputs, {:?}", write.outputs, write.outcome);
            }
            let read = batch.read(timestamp);
            println!("  read: {:?}, {} events", read.outcome, read.events);
        }

        println!("\nfinal state:");
        let common = batch.common_state();
        println!("  quality={:?} error={:#x}", common.quality, common.error);
        for point in batch.points() {
            let value = point
                .resolve_attribute("value")
                .and_then(|attribute| point.read_handle(&attribute).ok())
                .and_then(|handle| handle.read().ok());
            match value {
                Some(value) => println!("  {} = {:?}", point.name(), value),
                None => println!("  {} (write-only)", point.name()),
            }
        }
        tracing::debug!("Simulation metrics: {:?}", batch.metrics().snapshot());
        Ok(())
    }
}

fn find_point<'a>(config: &'a BatchConfig, name: &str) -> Result<&'a PointConfig> {
    match config.points.iter().find(|point| point.name == name) {
        Some(point) => Ok(point),
        None => bail!("unknown point: {}", name),
    }
}

/// 覆盖全部点所需的映像长度
fn image_len(config: &BatchConfig) -> usize {
    config
        .points
        .iter()
        .map(|point| point.offset as usize + point.data_type.width().unwrap_or(0))
        .max()
        .unwrap_or(0)
}

fn preset(transport: &MockTransport, offset: u32, value: DataValue) {
    match value {
        DataValue::Bool(v) => transport.set_value(offset, &v),
        DataValue::I16(v) => transport.set_value(offset, &v),
        DataValue::U16(v) => transport.set_value(offset, &v),
        DataValue::I32(v) => transport.set_value(offset, &v),
        DataValue::U32(v) => transport.set_value(offset, &v),
        DataValue::I64(v) => transport.set_value(offset, &v),
        DataValue::U64(v) => transport.set_value(offset, &v),
        DataValue::F32(v) => transport.set_value(offset, &v),
        DataValue::F64(v) => transport.set_value(offset, &v),
        DataValue::Timestamp(_) | DataValue::Quality(_) | DataValue::ErrorCode(_) => {},
    }
}
