//! 元素类注册表
//!
//! 每种可配置元素（批次、输入、输出）对应一个 [`ElementClass`]，
//! 配置文件通过类名引用它们。注册表在进程启动时构建一次，之后只读。

use crate::error::DriverError;
use std::sync::OnceLock;

pub const IO_BATCH_CLASS: &str = "IoBatch";
pub const INPUT_CLASS: &str = "Input";
pub const OUTPUT_CLASS: &str = "Output";

/// 元素种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Batch,
    Input,
    Output,
}

impl ElementKind {
    /// 能否作为点挂载到批次
    pub fn is_point(self) -> bool {
        matches!(self, ElementKind::Input | ElementKind::Output)
    }
}

/// 元素类元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementClass {
    pub name: &'static str,
    pub uuid: &'static str,
    pub kind: ElementKind,
    pub description: &'static str,
}

/// 元素类注册表
#[derive(Debug, Clone)]
pub struct ClassRegistry {
    classes: Vec<ElementClass>,
}

impl ClassRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self { classes: Vec::new() }
    }

    /// 内置的三个类
    pub fn builtin() -> Self {
        Self {
            classes: vec![
                ElementClass {
                    name: IO_BATCH_CLASS,
                    uuid: "6b1f3c2e-4a7d-4e59-9c0b-2d8e5f7a1c34",
                    kind: ElementKind::Batch,
                    description: "Batch of points read and written with one command per cycle",
                },
                ElementClass {
                    name: INPUT_CLASS,
                    uuid: "0e4d9a71-38c5-4b62-a1f7-93c2b8d06e5f",
                    kind: ElementKind::Input,
                    description: "Read-only point decoded from the batch read payload",
                },
                ElementClass {
                    name: OUTPUT_CLASS,
                    uuid: "c7a25e80-91d3-4f0a-8b64-5e1d7c39a2b8",
                    kind: ElementKind::Output,
                    description: "Writable point encoded into the batch write command",
                },
            ],
        }
    }

    /// 进程级注册表（首次访问时以内置类构建）
    pub fn global() -> &'static ClassRegistry {
        static REGISTRY: OnceLock<ClassRegistry> = OnceLock::new();
        REGISTRY.get_or_init(ClassRegistry::builtin)
    }

    /// 注册一个类；名称或 UUID 重复时返回错误
    pub fn register(&mut self, class: ElementClass) -> Result<(), DriverError> {
        if self.lookup(class.name).is_some() || self.by_uuid(class.uuid).is_some() {
            return Err(DriverError::InvalidInput(format!(
                "element class {} ({}) is already registered",
                class.name, class.uuid
            )));
        }
        self.classes.push(class);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&ElementClass> {
        self.classes.iter().find(|class| class.name == name)
    }

    /// 按 UUID 查找（大小写不敏感）
    pub fn by_uuid(&self, uuid: &str) -> Option<&ElementClass> {
        self.classes.iter().find(|class| class.uuid.eq_ignore_ascii_case(uuid))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementClass> {
        self.classes.iter()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
