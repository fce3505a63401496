//! 命令定义和实现

pub mod check;
pub mod simulate;

pub use check::CheckCommand;
pub use simulate::SimulateCommand;

use anyhow::{Context, Result, bail};
use pollbatch_sdk::{DataType, DataValue};

/// 按点的数据类型解析命令行中的值
pub fn parse_value(data_type: DataType, text: &str) -> Result<DataValue> {
    let text = text.trim();
    let value = match data_type {
        DataType::Bool => match text {
            "true" | "1" | "on" => DataValue::Bool(true),
            "false" | "0" | "off" => DataValue::Bool(false),
            _ => bail!("invalid bool value: {}", text),
        },
        DataType::I16 => DataValue::I16(text.parse().with_context(|| format!("invalid i16: {}", text))?),
        DataType::U16 => DataValue::U16(text.parse().with_context(|| format!("invalid u16: {}", text))?),
        DataType::I32 => DataValue::I32(text.parse().with_context(|| format!("invalid i32: {}", text))?),
        DataType::U32 => DataValue::U32(text.parse().with_context(|| format!("invalid u32: {}", text))?),
        DataType::I64 => DataValue::I64(text.parse().with_context(|| format!("invalid i64: {}", text))?),
        DataType::U64 => DataValue::U64(text.parse().with_context(|| format!("invalid u64: {}", text))?),
        DataType::F32 => DataValue::F32(text.parse().with_context(|| format!("invalid f32: {}", text))?),
        DataType::F64 => DataValue::F64(text.parse().with_context(|| format!("invalid f64: {}", text))?),
        DataType::Timestamp | DataType::Quality | DataType::ErrorCode => {
            bail!("{} is not a point value type", data_type)
        },
    };
    Ok(value)
}

/// 拆分 `name=value`
pub fn split_assignment(text: &str) -> Result<(&str, &str)> {
    text.split_once('=')
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| !name.is_empty())
        .with_context(|| format!("expected name=value, got {:?}", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value(DataType::Bool, "on").unwrap(), DataValue::Bool(true));
        assert_eq!(parse_value(DataType::I16, "-12").unwrap(), DataValue::I16(-12));
        assert_eq!(parse_value(DataType::F64, " 3.5 ").unwrap(), DataValue::F64(3.5));
        assert!(parse_value(DataType::U16, "-1").is_err());
        assert!(parse_value(DataType::Quality, "1").is_err());
    }

    #[test]
    fn test_split_assignment() {
        assert_eq!(split_assignment("speed = 12").unwrap(), ("speed", "12"));
        assert!(split_assignment("speed").is_err());
        assert!(split_assignment("=1").is_err());
    }
}
