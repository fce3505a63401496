//! 配置校验命令

use anyhow::{Context, Result};
use clap::Args;
use pollbatch_sdk::driver::{ClassRegistry, ElementKind};
use pollbatch_sdk::prelude::*;
use std::path::PathBuf;

/// 配置校验命令参数
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// 批次配置文件（TOML）
    pub config: PathBuf,
}

impl CheckCommand {
    pub fn execute(&self) -> Result<()> {
        let config = BatchConfig::load_from_file(&self.config)
            .with_context(|| format!("invalid configuration {}", self.config.display()))?;

        println!("✅ {} is valid", self.config.display());
        print!("{}", render_layout(&config)?);
        Ok(())
    }
}

/// 点布局表
pub fn render_layout(config: &BatchConfig) -> Result<String> {
    let registry = ClassRegistry::global();
    let mut out = String::new();
    out.push_str(&format!(
        "Batch {} (read every {} ms, write every {} ms)\n",
        config.name, config.read_interval_ms, config.write_interval_ms
    ));
    out.push_str(&format!(
        "  {:<20} {:<8} {:<6} {:>8} {:>6}  {}\n",
        "point", "class", "type", "offset", "width", "direction"
    ));

    for point in &config.points {
        let kind = point.kind(registry)?;
        let direction = match (kind, point.readback) {
            (ElementKind::Output, true) => "input/output",
            (ElementKind::Output, false) => "output",
            _ => "input",
        };
        out.push_str(&format!(
            "  {:<20} {:<8} {:<6} {:>8} {:>6}  {}\n",
            point.name,
            point.class,
            point.data_type.to_string(),
            point.offset,
            point.data_type.width().unwrap_or(0),
            direction
        ));
    }
    Ok(out)
}
