//! Events - 同期処理で発生するイベント
//!
//! Synchronizer は操作ごとに 1 つの `SyncEvent` を EventSink に送ります。
//! `is_failure()` が true のものはユーザーに見せる通知（ブロックしない）です。

use serde::Serialize;
use std::fmt;

/// Synchronizer が扱う操作の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    LoadTasks,
    CreateTask,
    ToggleTask,
    DeleteTask,
    ReorderTasks,
    CreateSubtask,
    ToggleSubtask,
    DeleteSubtask,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::LoadTasks => "load_tasks",
            Operation::CreateTask => "create_task",
            Operation::ToggleTask => "toggle_task",
            Operation::DeleteTask => "delete_task",
            Operation::ReorderTasks => "reorder_tasks",
            Operation::CreateSubtask => "create_subtask",
            Operation::ToggleSubtask => "toggle_subtask",
            Operation::DeleteSubtask => "delete_subtask",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SyncEvent は操作の結果
///
/// `entity` は表示用の ID 文字列（`task-42` など）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    Loaded {
        count: usize,
    },
    LoadFailed {
        reason: String,
    },
    /// サーバーの正本でローカルを置き換えた（delete は楽観的削除を確定）
    Confirmed {
        op: Operation,
        entity: String,
    },
    /// 成功したがペイロードが無い/壊れていたので楽観的状態をそのまま残した
    Unconfirmed {
        op: Operation,
        entity: String,
    },
    /// 失敗したので操作前の状態に戻した
    RolledBack {
        op: Operation,
        entity: String,
        reason: String,
    },
    /// 並び替えの保存に失敗（ローカルの順序は戻さない）
    ReorderNotPersisted {
        reason: String,
    },
    /// 対象がすでにストアに無かった
    Skipped {
        op: Operation,
        entity: String,
    },
}

impl SyncEvent {
    /// ユーザーに見せるべき失敗通知か
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SyncEvent::LoadFailed { .. }
                | SyncEvent::RolledBack { .. }
                | SyncEvent::ReorderNotPersisted { .. }
        )
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::Loaded { count } => write!(f, "loaded {count} tasks"),
            SyncEvent::LoadFailed { reason } => write!(f, "failed to load tasks: {reason}"),
            SyncEvent::Confirmed { op, entity } => write!(f, "{op} {entity}: confirmed"),
            SyncEvent::Unconfirmed { op, entity } => {
                write!(f, "{op} {entity}: no canonical data, keeping local state")
            }
            SyncEvent::RolledBack { op, entity, reason } => {
                write!(f, "{op} {entity} failed and was reverted: {reason}")
            }
            SyncEvent::ReorderNotPersisted { reason } => {
                write!(f, "new order was not saved: {reason}")
            }
            SyncEvent::Skipped { op, entity } => write!(f, "{op} {entity}: not in store"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_failures_are_flagged_for_the_user() {
        let rolled_back = SyncEvent::RolledBack {
            op: Operation::ToggleTask,
            entity: "task-1".into(),
            reason: "boom".into(),
        };
        assert!(rolled_back.is_failure());
        assert!(SyncEvent::ReorderNotPersisted { reason: "x".into() }.is_failure());
        assert!(!SyncEvent::Loaded { count: 0 }.is_failure());
        assert!(
            !SyncEvent::Skipped {
                op: Operation::DeleteTask,
                entity: "task-1".into()
            }
            .is_failure()
        );
    }

    #[test]
    fn events_serialize_with_a_tag() {
        let v = serde_json::to_value(SyncEvent::Confirmed {
            op: Operation::CreateSubtask,
            entity: "subtask-3".into(),
        })
        .unwrap();
        assert_eq!(v["event"], "confirmed");
        assert_eq!(v["op"], "create_subtask");
    }
}
