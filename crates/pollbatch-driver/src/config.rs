//! # 批次配置
//!
//! 批次及其点的 TOML 配置：
//!
//! ```toml
//! name = "plc-1"
//! read_interval_ms = 50
//! write_interval_ms = 100
//!
//! [[point]]
//! name = "temperature"
//! data_type = "f64"
//! offset = 0
//!
//! [[point]]
//! name = "setpoint"
//! class = "Output"
//! data_type = "u16"
//! offset = 8
//! readback = true
//! ```
//!
//! 所有检查都在第一个周期运行之前完成（[`BatchConfig::validate`]）。

use crate::pipeline::PipelineConfig;
use crate::registry::{ClassRegistry, ElementKind, INPUT_CLASS};
use pollbatch_protocol::DataType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Batch name must not be empty")]
    EmptyName,

    #[error("Point at index {0} has an empty name")]
    EmptyPointName(usize),

    #[error("{0} must be greater than zero")]
    InvalidInterval(&'static str),

    #[error("Duplicate point name: {0}")]
    DuplicatePoint(String),

    #[error("Point {point}: unknown class {class}")]
    UnknownClass { point: String, class: String },

    #[error("Point {point}: class {class} cannot be attached to a batch")]
    NotAPointClass { point: String, class: String },

    #[error("Point {point}: {data_type} cannot be used as a point value")]
    UnsupportedType { point: String, data_type: DataType },

    #[error("Point {0}: readback is only valid for outputs")]
    InvalidReadback(String),

    #[error("Point {point}: offset {offset} plus width {width} exceeds the address space")]
    OffsetOutOfRange { point: String, offset: u32, width: u32 },

    #[error("Points {first} and {second} overlap in the {direction} image")]
    Overlap {
        first: String,
        second: String,
        direction: &'static str,
    },
}

fn default_class() -> String {
    INPUT_CLASS.to_string()
}

fn default_interval_ms() -> u64 {
    100
}

/// 单个点的配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointConfig {
    pub name: String,

    /// 元素类名（见 [`ClassRegistry`]），默认 `Input`
    #[serde(default = "default_class")]
    pub class: String,

    pub data_type: DataType,

    /// 在设备映像中的字节偏移
    pub offset: u32,

    /// 输出是否同时回读设备值
    #[serde(default)]
    pub readback: bool,
}

impl PointConfig {
    pub fn input(name: &str, data_type: DataType, offset: u32) -> Self {
        Self {
            name: name.to_string(),
            class: INPUT_CLASS.to_string(),
            data_type,
            offset,
            readback: false,
        }
    }

    pub fn output(name: &str, data_type: DataType, offset: u32, readback: bool) -> Self {
        Self {
            name: name.to_string(),
            class: crate::registry::OUTPUT_CLASS.to_string(),
            data_type,
            offset,
            readback,
        }
    }

    /// 在注册表中解析元素种类
    pub fn kind(&self, registry: &ClassRegistry) -> Result<ElementKind, ConfigError> {
        let class = registry
            .lookup(&self.class)
            .ok_or_else(|| ConfigError::UnknownClass {
                point: self.name.clone(),
                class: self.class.clone(),
            })?;
        if !class.kind.is_point() {
            return Err(ConfigError::NotAPointClass {
                point: self.name.clone(),
                class: self.class.clone(),
            });
        }
        Ok(class.kind)
    }

    fn width(&self) -> Result<u32, ConfigError> {
        self.data_type
            .width()
            .map(|w| w as u32)
            .ok_or_else(|| ConfigError::UnsupportedType {
                point: self.name.clone(),
                data_type: self.data_type,
            })
    }
}

/// 批次配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    pub name: String,

    #[serde(default = "default_interval_ms")]
    pub read_interval_ms: u64,

    #[serde(default = "default_interval_ms")]
    pub write_interval_ms: u64,

    #[serde(rename = "point", default)]
    pub points: Vec<PointConfig>,
}

impl BatchConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            read_interval_ms: default_interval_ms(),
            write_interval_ms: default_interval_ms(),
            points: Vec::new(),
        }
    }

    /// 解析并校验 TOML 文本
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BatchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载并校验
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// 运行时周期配置
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            read_interval_ms: self.read_interval_ms,
            write_interval_ms: self.write_interval_ms,
        }
    }

    /// 使用进程级注册表校验
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_with(ClassRegistry::global())
    }

    /// 校验名称、周期、类、类型和地址重叠
    pub fn validate_with(&self, registry: &ClassRegistry) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.read_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval("read_interval_ms"));
        }
        if self.write_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval("write_interval_ms"));
        }

        let mut names = HashSet::with_capacity(self.points.len());
        // (起始, 结束, 名称)
        let mut read_ranges = Vec::new();
        let mut write_ranges = Vec::new();

        for (index, point) in self.points.iter().enumerate() {
            if point.name.trim().is_empty() {
                return Err(ConfigError::EmptyPointName(index));
            }
            if !names.insert(point.name.as_str()) {
                return Err(ConfigError::DuplicatePoint(point.name.clone()));
            }

            let kind = point.kind(registry)?;
            let width = point.width()?;
            let end = point
                .offset
                .checked_add(width)
                .ok_or_else(|| ConfigError::OffsetOutOfRange {
                    point: point.name.clone(),
                    offset: point.offset,
                    width,
                })?;
            let range = (point.offset, end, point.name.as_str());
            match kind {
                ElementKind::Input => {
                    if point.readback {
                        return Err(ConfigError::InvalidReadback(point.name.clone()));
                    }
                    read_ranges.push(range);
                },
                ElementKind::Output => {
                    write_ranges.push(range);
                    if point.readback {
                        read_ranges.push(range);
                    }
                },
                ElementKind::Batch => unreachable!("rejected by PointConfig::kind"),
            }
        }

        check_overlap(&mut read_ranges, "read")?;
        check_overlap(&mut write_ranges, "write")
    }
}

fn check_overlap(ranges: &mut [(u32, u32, &str)], direction: &'static str) -> Result<(), ConfigError> {
    ranges.sort_by_key(|&(start, end, _)| (start, end));
    for pair in ranges.windows(2) {
        let (_, first_end, first) = pair[0];
        let (second_start, _, second) = pair[1];
        if second_start < first_end {
            return Err(ConfigError::Overlap {
                first: first.to_string(),
                second: second.to_string(),
                direction,
            });
        }
    }
    Ok(())
}
