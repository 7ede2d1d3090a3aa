//! Synchronizer - 楽観的更新とロールバック
//!
//! ユーザー操作を受け取り、ローカルストアへ即座に反映してから Remote Task
//! Service に送信し、結果に応じて正本で置き換えるか操作前に戻します。
//!
//! # 手順（変更系）
//! 1. 入力検証（不正なら `SyncError::Validation`、何も変えない）
//! 2. 同時実行ガード（処理中なら `SyncError::Busy`）
//! 3. スナップショット → 楽観的適用（書き込みロックはここで解放）
//! 4. リクエスト
//! 5. 正本で置き換え / 応答なしなら据え置き / 失敗なら復元 + 通知
//!
//! 通信失敗は呼び出し側に `Err` として漏らしません。結果は
//! `MutationOutcome` と `SyncEvent` で伝えます。

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::command::{
    Command, CreateSubtask, CreateTask, DeleteSubtask, DeleteTask, EntityKey, Reply,
    ToggleSubtask, ToggleTask,
};
use super::in_flight::{InFlight, InFlightGuard};
use crate::domain::{
    Id, IdMarker, Operation, SubtaskId, SyncError, SyncEvent, TaskId, Title, ValidationError,
};
use crate::ports::{Clock, EventSink, IdGenerator, RemoteTaskService};
use crate::store::SharedStore;

/// 変更操作の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// 正本で置き換えた（delete は削除を確定）
    Confirmed,
    /// 成功応答にペイロードが無く、楽観的状態をそのまま残した
    Unconfirmed,
    /// 失敗したので操作前の状態に戻した
    RolledBack { reason: String },
    /// 対象がストアに無く、リクエストも送らなかった
    Skipped,
}

/// 並び替えの結果。ローカルの順序はどちらでも新しいまま
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderOutcome {
    Persisted,
    NotPersisted { reason: String },
    /// 移動元と移動先が同じで何もしなかった
    Unchanged,
}

/// 初回ロードの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { count: usize },
    /// 応答が一覧の形をしていなかったのでストアは変えていない
    Ignored,
    Failed { reason: String },
}

/// Synchronizer は Local State Store の唯一の書き手
///
/// `Clone` は安価で、クローン同士は同じストアと同時実行ガードを共有します。
pub struct Synchronizer<R> {
    remote: Arc<R>,
    store: SharedStore,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    in_flight: InFlight,
}

impl<R> Clone for Synchronizer<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            store: self.store.clone(),
            ids: Arc::clone(&self.ids),
            clock: Arc::clone(&self.clock),
            events: Arc::clone(&self.events),
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<R: RemoteTaskService> Synchronizer<R> {
    pub(crate) fn from_parts(
        remote: Arc<R>,
        store: SharedStore,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            remote,
            store,
            ids,
            clock,
            events,
            in_flight: InFlight::default(),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// 一覧を取得してストアを丸ごと置き換える
    pub async fn load(&self) -> LoadOutcome {
        match self.remote.list_tasks().await {
            Ok(Some(tasks)) => {
                let count = tasks.len();
                self.store.write().await.replace_all(tasks);
                info!(count, "loaded tasks");
                self.events.emit(SyncEvent::Loaded { count });
                LoadOutcome::Loaded { count }
            }
            Ok(None) => {
                warn!("task list response was not a list, keeping current state");
                LoadOutcome::Ignored
            }
            Err(err) => {
                warn!(error = %err, kind = ?err.kind(), "failed to load tasks");
                let reason = err.to_string();
                self.events.emit(SyncEvent::LoadFailed {
                    reason: reason.clone(),
                });
                LoadOutcome::Failed { reason }
            }
        }
    }

    /// 一時 ID のタスクを末尾に追加し、作成を依頼する
    ///
    /// `date` が無ければ今日（ローカル日付）。
    pub async fn create_task(
        &self,
        title: &str,
        date: Option<NaiveDate>,
    ) -> Result<MutationOutcome, SyncError> {
        let title = Title::parse(title)?;
        let command = CreateTask {
            temp_id: self.ids.temporary_task_id(),
            title,
            date: date.unwrap_or_else(|| self.clock.today()),
        };
        self.execute(command).await
    }

    pub async fn toggle_task(&self, id: &TaskId) -> Result<MutationOutcome, SyncError> {
        ensure_confirmed(id)?;
        self.execute(ToggleTask { id: id.clone() }).await
    }

    pub async fn delete_task(&self, id: &TaskId) -> Result<MutationOutcome, SyncError> {
        ensure_confirmed(id)?;
        self.execute(DeleteTask { id: id.clone() }).await
    }

    pub async fn create_subtask(
        &self,
        task_id: &TaskId,
        title: &str,
    ) -> Result<MutationOutcome, SyncError> {
        let title = Title::parse(title)?;
        ensure_confirmed(task_id)?;
        let command = CreateSubtask {
            task_id: task_id.clone(),
            temp_id: self.ids.temporary_subtask_id(),
            title,
        };
        self.execute(command).await
    }

    pub async fn toggle_subtask(
        &self,
        task_id: &TaskId,
        subtask_id: &SubtaskId,
    ) -> Result<MutationOutcome, SyncError> {
        ensure_confirmed(subtask_id)?;
        let command = ToggleSubtask {
            task_id: task_id.clone(),
            subtask_id: subtask_id.clone(),
        };
        self.execute(command).await
    }

    pub async fn delete_subtask(
        &self,
        task_id: &TaskId,
        subtask_id: &SubtaskId,
    ) -> Result<MutationOutcome, SyncError> {
        ensure_confirmed(subtask_id)?;
        let command = DeleteSubtask {
            task_id: task_id.clone(),
            subtask_id: subtask_id.clone(),
        };
        self.execute(command).await
    }

    /// Applies `new_order` locally, then persists dense positions.
    ///
    /// A failed persist is reported but the local order is kept.
    pub async fn reorder(&self, new_order: &[TaskId]) -> Result<ReorderOutcome, SyncError> {
        let positions = {
            let mut store = self.store.write().await;
            store.reorder(new_order)?;
            store.positions()
        };
        debug!(count = positions.len(), "applied new order");

        match self.remote.persist_positions(&positions).await {
            Ok(()) => {
                info!(count = positions.len(), "order persisted");
                Ok(ReorderOutcome::Persisted)
            }
            Err(err) => {
                warn!(error = %err, kind = ?err.kind(), "order was not persisted");
                let reason = err.to_string();
                self.events.emit(SyncEvent::ReorderNotPersisted {
                    reason: reason.clone(),
                });
                Ok(ReorderOutcome::NotPersisted { reason })
            }
        }
    }

    /// Drag-and-drop: moves `active` to the slot currently held by `over`.
    pub async fn move_task(
        &self,
        active: &TaskId,
        over: &TaskId,
    ) -> Result<ReorderOutcome, SyncError> {
        if active == over {
            return Ok(ReorderOutcome::Unchanged);
        }
        let new_order = {
            let store = self.store.read().await;
            let from = store
                .index_of(active)
                .ok_or_else(|| ValidationError::UnknownTask(active.to_string()))?;
            let to = store
                .index_of(over)
                .ok_or_else(|| ValidationError::UnknownTask(over.to_string()))?;
            let mut ids: Vec<TaskId> = store.tasks().iter().map(|t| t.id.clone()).collect();
            let moved = ids.remove(from);
            ids.insert(to, moved);
            ids
        };
        self.reorder(&new_order).await
    }

    async fn execute<C: Command>(&self, command: C) -> Result<MutationOutcome, SyncError> {
        let _guard = self.claim(command.target(), command.covers_subtasks())?;
        Ok(self.run(&command).await)
    }

    fn claim(
        &self,
        target: Option<EntityKey>,
        covers_subtasks: bool,
    ) -> Result<Option<InFlightGuard>, SyncError> {
        let Some(key) = target else {
            return Ok(None);
        };
        match self.in_flight.claim(key.clone(), covers_subtasks) {
            Some(guard) => Ok(Some(guard)),
            None => {
                debug!(entity = %key, "mutation already in flight");
                Err(SyncError::Busy(key.to_string()))
            }
        }
    }

    async fn run<C: Command>(&self, command: &C) -> MutationOutcome {
        let op = command.operation();
        let entity = command.entity();

        let snapshot = {
            let mut store = self.store.write().await;
            command.apply(&mut store)
        };
        let Some(snapshot) = snapshot else {
            debug!(%op, %entity, "target not in store, skipping");
            self.emit(op, &entity, Event::Skipped);
            return MutationOutcome::Skipped;
        };
        debug!(%op, %entity, "applied optimistically");

        match command.send(&*self.remote).await {
            Ok(Reply::Canonical(canonical)) => {
                command.reconcile(&mut *self.store.write().await, canonical);
                info!(%op, %entity, "confirmed");
                self.emit(op, &entity, Event::Confirmed);
                MutationOutcome::Confirmed
            }
            Ok(Reply::Ack) => {
                info!(%op, %entity, "confirmed");
                self.emit(op, &entity, Event::Confirmed);
                MutationOutcome::Confirmed
            }
            Ok(Reply::Missing) => {
                warn!(%op, %entity, "response carried no usable payload, keeping local state");
                self.emit(op, &entity, Event::Unconfirmed);
                MutationOutcome::Unconfirmed
            }
            Err(err) => {
                snapshot.restore(&mut *self.store.write().await);
                warn!(%op, %entity, error = %err, kind = ?err.kind(), "rolled back");
                let reason = err.to_string();
                self.emit(
                    op,
                    &entity,
                    Event::RolledBack {
                        reason: reason.clone(),
                    },
                );
                MutationOutcome::RolledBack { reason }
            }
        }
    }

    fn emit(&self, op: Operation, entity: &str, event: Event) {
        let entity = entity.to_string();
        self.events.emit(match event {
            Event::Confirmed => SyncEvent::Confirmed { op, entity },
            Event::Unconfirmed => SyncEvent::Unconfirmed { op, entity },
            Event::Skipped => SyncEvent::Skipped { op, entity },
            Event::RolledBack { reason } => SyncEvent::RolledBack { op, entity, reason },
        });
    }
}

enum Event {
    Confirmed,
    Unconfirmed,
    Skipped,
    RolledBack { reason: String },
}

fn ensure_confirmed<T: IdMarker>(id: &Id<T>) -> Result<(), ValidationError> {
    if id.is_temporary() {
        return Err(ValidationError::UnconfirmedEntity(id.to_string()));
    }
    Ok(())
}
