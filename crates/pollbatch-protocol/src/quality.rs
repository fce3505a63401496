//! 数据质量

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// 批次最近一次读取的粗粒度健康标志
///
/// 初始状态为 `Bad`（尚未读到任何数据）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Quality {
    /// 最近一次读取成功
    Good = 0,
    /// 最近一次读取失败，或尚未读取
    #[default]
    Bad = 1,
}

impl Quality {
    /// 由读取结果得到质量
    #[inline]
    pub fn from_outcome<E>(outcome: Result<(), E>) -> Self {
        if outcome.is_ok() { Quality::Good } else { Quality::Bad }
    }

    #[inline]
    pub fn is_good(self) -> bool {
        self == Quality::Good
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Good => write!(f, "good"),
            Quality::Bad => write!(f, "bad"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_bad() {
        assert_eq!(Quality::default(), Quality::Bad);
    }

    #[test]
    fn test_from_outcome() {
        assert_eq!(Quality::from_outcome::<()>(Ok(())), Quality::Good);
        assert_eq!(Quality::from_outcome(Err(42)), Quality::Bad);
    }

    #[test]
    fn test_primitive_conversion() {
        assert_eq!(u8::from(Quality::Good), 0);
        assert_eq!(Quality::try_from(1u8).unwrap(), Quality::Bad);
        assert!(Quality::try_from(7u8).is_err());
    }
}
