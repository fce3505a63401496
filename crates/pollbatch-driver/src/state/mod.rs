//! 状态跟踪器
//!
//! 每个跟踪器在数据块中占据一条记录，并在配置阶段注册自己的事件：
//!
//! | 跟踪器 | 记录 | 事件 |
//! |--------|------|------|
//! | [`CommonReadState`] | `updateTime` / `quality` / `error` | `read`、`quality` |
//! | [`PerValueReadState`] | `value` / `changeTime` | `value`、`changed` |
//! | [`WriteState`] | `writeTime` / `writeError` | `written`、`writeError` |
//!
//! 更新函数只在写事务内调用：先比较旧快照，再**重写全部字段**，
//! 最后把需要触发的事件追加到 [`PendingEventList`](crate::PendingEventList)。

mod common_read;
mod per_value;
mod write;

pub use common_read::{Changes, CommonReadRecord, CommonReadState};
pub use per_value::{PerValueReadState, ValueRecord};
pub use write::{WriteRecord, WriteState};
