//! Command - 楽観的更新の 2 フェーズコマンド
//!
//! 各操作を「スナップショット → 適用 → 確定 or 復元」のコマンドオブジェクト
//! として表現します。Synchronizer はコマンドの種類を知らずに同じ手順で実行し、
//! ロールバックの契約はエンティティ種別ごとに単体でテストできます。
//!
//! # フェーズ
//! 1. `apply`: 影響を受ける状態を `Snapshot` に取り、ストアを楽観的に変更
//!    （対象が無ければ `None` = 何もしない）
//! 2. `send`: Remote Task Service へリクエスト
//! 3. 成功: `reconcile` で正本に置き換え / 失敗: `Snapshot::restore`

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{
    NewSubtask, NewTask, Operation, RemoteError, Subtask, SubtaskId, Task, TaskId, Title,
};
use crate::ports::RemoteTaskService;
use crate::store::TaskStore;

/// 同時実行ガードのキー
///
/// サブタスク ID は親タスクの中でだけ一意なので、親の ID も含めます。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Task(TaskId),
    Subtask(TaskId, SubtaskId),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Task(id) => write!(f, "{id}"),
            EntityKey::Subtask(_, id) => write!(f, "{id}"),
        }
    }
}

/// サービスからの応答の分類
#[derive(Debug, Clone, PartialEq)]
pub enum Reply<T> {
    /// 正本データが返ってきた
    Canonical(T),
    /// 2xx だがペイロードが無い/壊れている
    Missing,
    /// ペイロードを伴わない成功（delete）
    Ack,
}

impl<T> From<Option<T>> for Reply<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(canonical) => Reply::Canonical(canonical),
            None => Reply::Missing,
        }
    }
}

/// Pre-mutation state of exactly the entity a command touched.
///
/// Restoring only that entity leaves unrelated concurrent changes intact.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    CreatedTask {
        temp_id: TaskId,
    },
    CreatedSubtask {
        task_id: TaskId,
        temp_id: SubtaskId,
    },
    TaskCompleted {
        id: TaskId,
        completed: bool,
    },
    SubtaskCompleted {
        task_id: TaskId,
        subtask_id: SubtaskId,
        completed: bool,
    },
    RemovedTask {
        index: usize,
        task: Task,
    },
    RemovedSubtask {
        task_id: TaskId,
        index: usize,
        subtask: Subtask,
    },
}

impl Snapshot {
    pub fn restore(self, store: &mut TaskStore) {
        match self {
            Snapshot::CreatedTask { temp_id } => {
                store.remove_by_id(&temp_id);
            }
            Snapshot::CreatedSubtask { task_id, temp_id } => {
                store.remove_subtask(&task_id, &temp_id);
            }
            Snapshot::TaskCompleted { id, completed } => {
                store.update_by_id(&id, |t| t.completed = completed);
            }
            Snapshot::SubtaskCompleted {
                task_id,
                subtask_id,
                completed,
            } => {
                store.update_subtask(&task_id, &subtask_id, |s| s.completed = completed);
            }
            Snapshot::RemovedTask { index, task } => {
                // a reload may already have brought it back
                if store.get(&task.id).is_none() {
                    store.insert_at(index, task);
                }
            }
            Snapshot::RemovedSubtask {
                task_id,
                index,
                subtask,
            } => {
                let present = store
                    .get(&task_id)
                    .is_some_and(|t| t.subtask(&subtask.id).is_some());
                if !present {
                    store.insert_subtask_at(&task_id, index, subtask);
                }
            }
        }
    }
}

/// 2 フェーズコマンド
#[async_trait]
pub trait Command: Send + Sync {
    type Canonical: Send;

    fn operation(&self) -> Operation;

    /// 表示用の対象 ID（`task-42` など）
    fn entity(&self) -> String;

    /// 同時実行ガードの対象。タスク作成は新規エンティティなので `None`
    fn target(&self) -> Option<EntityKey>;

    /// `true` ならタスク配下のサブタスク操作とも排他にする
    fn covers_subtasks(&self) -> bool {
        false
    }

    /// スナップショットを取り、楽観的に適用する
    fn apply(&self, store: &mut TaskStore) -> Option<Snapshot>;

    async fn send(
        &self,
        remote: &dyn RemoteTaskService,
    ) -> Result<Reply<Self::Canonical>, RemoteError>;

    /// 正本で置き換える（対象が消えていれば何もしない）
    fn reconcile(&self, store: &mut TaskStore, canonical: Self::Canonical);
}

// ========================================
// Task
// ========================================

pub struct CreateTask {
    pub temp_id: TaskId,
    pub title: Title,
    pub date: NaiveDate,
}

#[async_trait]
impl Command for CreateTask {
    type Canonical = Task;

    fn operation(&self) -> Operation {
        Operation::CreateTask
    }

    fn entity(&self) -> String {
        self.temp_id.to_string()
    }

    fn target(&self) -> Option<EntityKey> {
        None
    }

    fn apply(&self, store: &mut TaskStore) -> Option<Snapshot> {
        store.insert(Task::draft(self.temp_id.clone(), &self.title, self.date));
        Some(Snapshot::CreatedTask {
            temp_id: self.temp_id.clone(),
        })
    }

    async fn send(&self, remote: &dyn RemoteTaskService) -> Result<Reply<Task>, RemoteError> {
        let body = NewTask {
            title: self.title.as_str().to_string(),
            date: self.date,
        };
        Ok(remote.create_task(&body).await?.into())
    }

    fn reconcile(&self, store: &mut TaskStore, canonical: Task) {
        store.replace_by_id(&self.temp_id, canonical);
    }
}

pub struct ToggleTask {
    pub id: TaskId,
}

#[async_trait]
impl Command for ToggleTask {
    type Canonical = Task;

    fn operation(&self) -> Operation {
        Operation::ToggleTask
    }

    fn entity(&self) -> String {
        self.id.to_string()
    }

    fn target(&self) -> Option<EntityKey> {
        Some(EntityKey::Task(self.id.clone()))
    }

    fn apply(&self, store: &mut TaskStore) -> Option<Snapshot> {
        let completed = store.get(&self.id)?.completed;
        store.update_by_id(&self.id, |t| t.completed = !completed);
        Some(Snapshot::TaskCompleted {
            id: self.id.clone(),
            completed,
        })
    }

    async fn send(&self, remote: &dyn RemoteTaskService) -> Result<Reply<Task>, RemoteError> {
        Ok(remote.toggle_task(&self.id).await?.into())
    }

    fn reconcile(&self, store: &mut TaskStore, canonical: Task) {
        // The toggle endpoint may answer without the subtask relation; an
        // empty list there does not mean the subtasks are gone.
        store.update_by_id(&self.id, |task| {
            task.title = canonical.title;
            task.date = canonical.date;
            task.completed = canonical.completed;
            if canonical.position.is_some() {
                task.position = canonical.position;
            }
            if !canonical.subtasks.is_empty() {
                task.subtasks = canonical.subtasks;
            }
        });
    }
}

pub struct DeleteTask {
    pub id: TaskId,
}

#[async_trait]
impl Command for DeleteTask {
    type Canonical = ();

    fn operation(&self) -> Operation {
        Operation::DeleteTask
    }

    fn entity(&self) -> String {
        self.id.to_string()
    }

    fn target(&self) -> Option<EntityKey> {
        Some(EntityKey::Task(self.id.clone()))
    }

    // the restore puts the subtasks back as they were at apply time
    fn covers_subtasks(&self) -> bool {
        true
    }

    fn apply(&self, store: &mut TaskStore) -> Option<Snapshot> {
        let (index, task) = store.remove_by_id(&self.id)?;
        Some(Snapshot::RemovedTask { index, task })
    }

    async fn send(&self, remote: &dyn RemoteTaskService) -> Result<Reply<()>, RemoteError> {
        remote.delete_task(&self.id).await?;
        Ok(Reply::Ack)
    }

    fn reconcile(&self, _store: &mut TaskStore, _canonical: ()) {}
}

// ========================================
// Subtask
// ========================================

pub struct CreateSubtask {
    pub task_id: TaskId,
    pub temp_id: SubtaskId,
    pub title: Title,
}

#[async_trait]
impl Command for CreateSubtask {
    type Canonical = Subtask;

    fn operation(&self) -> Operation {
        Operation::CreateSubtask
    }

    fn entity(&self) -> String {
        self.temp_id.to_string()
    }

    fn target(&self) -> Option<EntityKey> {
        Some(EntityKey::Subtask(self.task_id.clone(), self.temp_id.clone()))
    }

    fn apply(&self, store: &mut TaskStore) -> Option<Snapshot> {
        let draft = Subtask::draft(self.temp_id.clone(), &self.title);
        if !store.push_subtask(&self.task_id, draft) {
            return None;
        }
        Some(Snapshot::CreatedSubtask {
            task_id: self.task_id.clone(),
            temp_id: self.temp_id.clone(),
        })
    }

    async fn send(&self, remote: &dyn RemoteTaskService) -> Result<Reply<Subtask>, RemoteError> {
        let body = NewSubtask {
            todo_id: self.task_id.clone(),
            title: self.title.as_str().to_string(),
        };
        Ok(remote.create_subtask(&body).await?.into())
    }

    fn reconcile(&self, store: &mut TaskStore, canonical: Subtask) {
        store.replace_subtask(&self.task_id, &self.temp_id, canonical);
    }
}

pub struct ToggleSubtask {
    pub task_id: TaskId,
    pub subtask_id: SubtaskId,
}

#[async_trait]
impl Command for ToggleSubtask {
    type Canonical = Subtask;

    fn operation(&self) -> Operation {
        Operation::ToggleSubtask
    }

    fn entity(&self) -> String {
        self.subtask_id.to_string()
    }

    fn target(&self) -> Option<EntityKey> {
        Some(EntityKey::Subtask(
            self.task_id.clone(),
            self.subtask_id.clone(),
        ))
    }

    fn apply(&self, store: &mut TaskStore) -> Option<Snapshot> {
        let completed = store.get(&self.task_id)?.subtask(&self.subtask_id)?.completed;
        store.update_subtask(&self.task_id, &self.subtask_id, |s| s.completed = !completed);
        Some(Snapshot::SubtaskCompleted {
            task_id: self.task_id.clone(),
            subtask_id: self.subtask_id.clone(),
            completed,
        })
    }

    async fn send(&self, remote: &dyn RemoteTaskService) -> Result<Reply<Subtask>, RemoteError> {
        Ok(remote.toggle_subtask(&self.subtask_id).await?.into())
    }

    fn reconcile(&self, store: &mut TaskStore, canonical: Subtask) {
        store.replace_subtask(&self.task_id, &self.subtask_id, canonical);
    }
}

pub struct DeleteSubtask {
    pub task_id: TaskId,
    pub subtask_id: SubtaskId,
}

#[async_trait]
impl Command for DeleteSubtask {
    type Canonical = ();

    fn operation(&self) -> Operation {
        Operation::DeleteSubtask
    }

    fn entity(&self) -> String {
        self.subtask_id.to_string()
    }

    fn target(&self) -> Option<EntityKey> {
        Some(EntityKey::Subtask(
            self.task_id.clone(),
            self.subtask_id.clone(),
        ))
    }

    fn apply(&self, store: &mut TaskStore) -> Option<Snapshot> {
        let (index, subtask) = store.remove_subtask(&self.task_id, &self.subtask_id)?;
        Some(Snapshot::RemovedSubtask {
            task_id: self.task_id.clone(),
            index,
            subtask,
        })
    }

    async fn send(&self, remote: &dyn RemoteTaskService) -> Result<Reply<()>, RemoteError> {
        remote.delete_subtask(&self.subtask_id).await?;
        Ok(Reply::Ack)
    }

    fn reconcile(&self, _store: &mut TaskStore, _canonical: ()) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SubtaskId;
    use ulid::Ulid;

    fn title(s: &str) -> Title {
        Title::parse(s).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn store() -> TaskStore {
        let mut a = Task::draft(TaskId::server(1), &title("a"), day());
        a.subtasks = vec![
            Subtask::draft(SubtaskId::server(10), &title("a1")),
            Subtask::draft(SubtaskId::server(11), &title("a2")),
        ];
        let b = Task::draft(TaskId::server(2), &title("b"), day());
        TaskStore::from_tasks(vec![a, b])
    }

    /// apply → restore must leave the store exactly as it was.
    fn assert_restores<C: Command>(command: C) {
        let mut s = store();
        let before = s.clone();
        let snapshot = command.apply(&mut s).expect("target exists");
        assert_ne!(s, before, "apply must change the store");
        snapshot.restore(&mut s);
        assert_eq!(s, before);
    }

    #[test]
    fn create_task_restores() {
        assert_restores(CreateTask {
            temp_id: TaskId::temporary(Ulid::new()),
            title: title("new"),
            date: day(),
        });
    }

    #[test]
    fn toggle_task_restores() {
        assert_restores(ToggleTask { id: TaskId::server(2) });
    }

    #[test]
    fn delete_task_restores_position() {
        assert_restores(DeleteTask { id: TaskId::server(1) });
    }

    #[test]
    fn create_subtask_restores() {
        assert_restores(CreateSubtask {
            task_id: TaskId::server(1),
            temp_id: SubtaskId::temporary(Ulid::new()),
            title: title("a3"),
        });
    }

    #[test]
    fn toggle_subtask_restores() {
        assert_restores(ToggleSubtask {
            task_id: TaskId::server(1),
            subtask_id: SubtaskId::server(11),
        });
    }

    #[test]
    fn delete_subtask_restores_position() {
        assert_restores(DeleteSubtask {
            task_id: TaskId::server(1),
            subtask_id: SubtaskId::server(10),
        });
    }

    #[test]
    fn commands_on_missing_targets_do_not_apply() {
        let mut s = store();
        let before = s.clone();
        assert!(ToggleTask { id: TaskId::server(9) }.apply(&mut s).is_none());
        assert!(DeleteTask { id: TaskId::server(9) }.apply(&mut s).is_none());
        assert!(
            CreateSubtask {
                task_id: TaskId::server(9),
                temp_id: SubtaskId::temporary(Ulid::new()),
                title: title("x"),
            }
            .apply(&mut s)
            .is_none()
        );
        assert!(
            ToggleSubtask {
                task_id: TaskId::server(2),
                subtask_id: SubtaskId::server(10),
            }
            .apply(&mut s)
            .is_none()
        );
        assert_eq!(s, before);
    }

    #[test]
    fn toggle_reconcile_keeps_local_subtasks_when_response_has_none() {
        let mut s = store();
        let command = ToggleTask { id: TaskId::server(1) };
        command.apply(&mut s).unwrap();

        let mut canonical = Task::draft(TaskId::server(1), &title("a"), day());
        canonical.completed = true;
        command.reconcile(&mut s, canonical);

        let task = s.get(&TaskId::server(1)).unwrap();
        assert!(task.completed);
        assert_eq!(task.subtasks.len(), 2);
    }

    #[test]
    fn reconcile_after_parent_deleted_is_a_noop() {
        let mut s = store();
        let command = CreateSubtask {
            task_id: TaskId::server(1),
            temp_id: SubtaskId::temporary(Ulid::new()),
            title: title("late"),
        };
        let snapshot = command.apply(&mut s).unwrap();
        s.remove_by_id(&TaskId::server(1));
        let after_delete = s.clone();

        command.reconcile(
            &mut s,
            Subtask::draft(SubtaskId::server(99), &title("late")),
        );
        assert_eq!(s, after_delete);
        snapshot.restore(&mut s);
        assert_eq!(s, after_delete);
    }
}
