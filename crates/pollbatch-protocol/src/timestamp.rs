//! 时间戳类型
//!
//! 状态记录中的所有时间字段都使用 [`Timestamp`]：自 UNIX 纪元起的微秒数。
//! `0` 表示"从未发生"，对应状态记录的初始值。

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 微秒级墙钟时间戳
///
/// - `Copy` + 定长，可以直接放进状态记录
/// - `Default` 为 [`Timestamp::NEVER`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp(u64);

impl Timestamp {
    /// 从未发生
    pub const NEVER: Timestamp = Timestamp(0);

    /// 由微秒数构造
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Timestamp(micros)
    }

    /// 当前系统时间
    ///
    /// 系统时钟早于 UNIX 纪元时返回 [`Timestamp::NEVER`]。
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    /// 微秒数
    #[inline]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// 是否为"从未发生"
    #[inline]
    pub const fn is_never(self) -> bool {
        self.0 == 0
    }

    /// 与另一个时间戳的间隔（饱和到 0）
    pub fn saturating_since(self, earlier: Timestamp) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        time.duration_since(UNIX_EPOCH)
            .map(|d| Timestamp(d.as_micros() as u64))
            .unwrap_or(Timestamp::NEVER)
    }
}

impl From<Timestamp> for SystemTime {
    fn from(ts: Timestamp) -> Self {
        UNIX_EPOCH + Duration::from_micros(ts.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            write!(f, "never")
        } else {
            write!(f, "{}.{:06}", self.0 / 1_000_000, self.0 % 1_000_000)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_never() {
        let ts = Timestamp::default();
        assert!(ts.is_never());
        assert_eq!(ts, Timestamp::NEVER);
        assert_eq!(ts.to_string(), "never");
    }

    #[test]
    fn test_system_time_conversion() {
        let ts = Timestamp::from_micros(1_700_000_000_123_456);
        let system: SystemTime = ts.into();
        assert_eq!(Timestamp::from(system), ts);
        assert_eq!(ts.to_string(), "1700000000.123456");
    }

    #[test]
    fn test_now_is_after_epoch() {
        assert!(!Timestamp::now().is_never());
    }

    #[test]
    fn test_saturating_since() {
        let a = Timestamp::from_micros(1_000);
        let b = Timestamp::from_micros(3_500);
        assert_eq!(b.saturating_since(a), Duration::from_micros(2_500));
        assert_eq!(a.saturating_since(b), Duration::ZERO);
    }
}
