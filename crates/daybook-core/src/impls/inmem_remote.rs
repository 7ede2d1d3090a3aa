//! InMemoryRemote - 開発・テスト用の Remote Task Service
//!
//! サーバーと同じ振る舞い（整数 ID の採番、position、削除時の subtask
//! カスケード）をプロセス内で再現し、障害注入とリクエストの一時停止を
//! 備えます。
//!
//! # 障害注入
//! - `fail_next(n)`: 次の n 回を 500 で失敗させる
//! - `set_offline(true)`: 通信エラー
//! - `set_malformed(true)`: 処理はするが応答ペイロードを返さない
//!
//! # 一時停止
//! `hold_requests()` の後に届いたリクエストは `release(n)` されるまで
//! 応答を返しません。楽観的状態が確定前に見えることを観察するために使います。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore};
use tracing::debug;

use crate::domain::{
    Id, IdMarker, NewSubtask, NewTask, Operation, Position, RemoteError, ServerKey, Subtask,
    SubtaskId, Task, TaskId,
};
use crate::ports::RemoteTaskService;

/// 受け付けたリクエストの記録
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub op: Operation,
    pub target: Option<String>,
}

#[derive(Debug, Default)]
struct ServerState {
    tasks: Vec<Task>,
    next_task: i64,
    next_subtask: i64,
}

impl ServerState {
    fn task_mut(&mut self, id: &TaskId) -> Result<&mut Task, RemoteError> {
        self.tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| not_found(id))
    }

    fn subtask_mut(&mut self, id: &SubtaskId) -> Result<&mut Subtask, RemoteError> {
        self.tasks
            .iter_mut()
            .flat_map(|t| t.subtasks.iter_mut())
            .find(|s| &s.id == id)
            .ok_or_else(|| not_found(id))
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_next: usize,
    offline: bool,
    malformed: bool,
}

#[derive(Debug)]
pub struct InMemoryRemote {
    state: Mutex<ServerState>,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<RemoteCall>>,
    held: AtomicBool,
    gate: Semaphore,
    pending: AtomicUsize,
    arrived: Notify,
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::with_tasks(Vec::new())
    }

    /// 既存データで初期化する。採番は既存の整数 ID の最大値の次から。
    /// position の無いタスクには並び順どおりの position を振る
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let tasks: Vec<Task> = tasks
            .into_iter()
            .enumerate()
            .map(|(index, mut task)| {
                task.position.get_or_insert(index as i64);
                task
            })
            .collect();
        let next_task = max_int(tasks.iter().map(|t| &t.id)) + 1;
        let next_subtask =
            max_int(tasks.iter().flat_map(|t| t.subtasks.iter().map(|s| &s.id))) + 1;
        Self {
            state: Mutex::new(ServerState {
                tasks,
                next_task,
                next_subtask,
            }),
            faults: Mutex::default(),
            calls: Mutex::default(),
            held: AtomicBool::new(false),
            gate: Semaphore::new(0),
            pending: AtomicUsize::new(0),
            arrived: Notify::new(),
        }
    }

    pub fn fail_next(&self, n: usize) {
        lock(&self.faults).fail_next = n;
    }

    pub fn set_offline(&self, offline: bool) {
        lock(&self.faults).offline = offline;
    }

    pub fn set_malformed(&self, malformed: bool) {
        lock(&self.faults).malformed = malformed;
    }

    pub fn hold_requests(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    /// 止めているリクエストを n 件進める
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    /// 一時停止を解除し、待っているリクエストもすべて進める
    pub fn resume(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.gate.add_permits(self.pending.load(Ordering::SeqCst));
    }

    /// 止められているリクエストが `n` 件以上になるまで待つ
    pub async fn wait_for_pending(&self, n: usize) {
        loop {
            let notified = self.arrived.notified();
            if self.pending.load(Ordering::SeqCst) >= n {
                return;
            }
            notified.await;
        }
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.calls).clone()
    }

    /// サーバー側の現在の一覧（position 順）
    pub fn tasks(&self) -> Vec<Task> {
        sorted(&lock(&self.state).tasks)
    }

    async fn enter(&self, op: Operation, target: Option<String>) -> Result<(), RemoteError> {
        debug!(%op, target = target.as_deref().unwrap_or("-"), "request received");
        lock(&self.calls).push(RemoteCall { op, target });

        if self.held.load(Ordering::SeqCst) {
            self.pending.fetch_add(1, Ordering::SeqCst);
            self.arrived.notify_waiters();
            let permit = self.gate.acquire().await;
            self.pending.fetch_sub(1, Ordering::SeqCst);
            permit
                .map_err(|e| RemoteError::Transport(e.to_string()))?
                .forget();
        }

        let mut faults = lock(&self.faults);
        if faults.offline {
            return Err(RemoteError::Transport("service unreachable".to_string()));
        }
        if faults.fail_next > 0 {
            faults.fail_next -= 1;
            return Err(RemoteError::Status {
                status: 500,
                body: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn respond<T>(&self, payload: T) -> Option<T> {
        if lock(&self.faults).malformed {
            None
        } else {
            Some(payload)
        }
    }
}

#[async_trait]
impl RemoteTaskService for InMemoryRemote {
    async fn list_tasks(&self) -> Result<Option<Vec<Task>>, RemoteError> {
        self.enter(Operation::LoadTasks, None).await?;
        let tasks = self.tasks();
        Ok(self.respond(tasks))
    }

    async fn create_task(&self, new_task: &NewTask) -> Result<Option<Task>, RemoteError> {
        self.enter(Operation::CreateTask, None).await?;
        let task = {
            let mut state = lock(&self.state);
            let id = state.next_task;
            state.next_task += 1;
            let position = state
                .tasks
                .iter()
                .filter_map(|t| t.position)
                .max()
                .map_or(0, |p| p + 1);
            let task = Task {
                id: TaskId::server(id),
                title: new_task.title.clone(),
                date: new_task.date,
                completed: false,
                subtasks: Vec::new(),
                position: Some(position),
            };
            state.tasks.push(task.clone());
            task
        };
        Ok(self.respond(task))
    }

    async fn toggle_task(&self, id: &TaskId) -> Result<Option<Task>, RemoteError> {
        let target = confirmed(id)?;
        self.enter(Operation::ToggleTask, Some(target)).await?;
        let task = {
            let mut state = lock(&self.state);
            let task = state.task_mut(id)?;
            task.completed = !task.completed;
            task.clone()
        };
        Ok(self.respond(task))
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), RemoteError> {
        let target = confirmed(id)?;
        self.enter(Operation::DeleteTask, Some(target)).await?;
        let mut state = lock(&self.state);
        let index = state
            .tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| not_found(id))?;
        // subtasks go with their task
        state.tasks.remove(index);
        Ok(())
    }

    async fn persist_positions(&self, positions: &[Position]) -> Result<(), RemoteError> {
        for entry in positions {
            confirmed(&entry.id)?;
        }
        self.enter(Operation::ReorderTasks, None).await?;
        let mut state = lock(&self.state);
        for entry in positions {
            if let Ok(task) = state.task_mut(&entry.id) {
                task.position = Some(entry.position as i64);
            }
        }
        Ok(())
    }

    async fn create_subtask(
        &self,
        new_subtask: &NewSubtask,
    ) -> Result<Option<Subtask>, RemoteError> {
        let target = confirmed(&new_subtask.todo_id)?;
        self.enter(Operation::CreateSubtask, Some(target)).await?;
        let subtask = {
            let mut state = lock(&self.state);
            let id = state.next_subtask;
            let parent = state.task_mut(&new_subtask.todo_id)?;
            let subtask = Subtask {
                id: SubtaskId::server(id),
                title: new_subtask.title.clone(),
                completed: false,
            };
            parent.subtasks.push(subtask.clone());
            state.next_subtask += 1;
            subtask
        };
        Ok(self.respond(subtask))
    }

    async fn toggle_subtask(&self, id: &SubtaskId) -> Result<Option<Subtask>, RemoteError> {
        let target = confirmed(id)?;
        self.enter(Operation::ToggleSubtask, Some(target)).await?;
        let subtask = {
            let mut state = lock(&self.state);
            let subtask = state.subtask_mut(id)?;
            subtask.completed = !subtask.completed;
            subtask.clone()
        };
        Ok(self.respond(subtask))
    }

    async fn delete_subtask(&self, id: &SubtaskId) -> Result<(), RemoteError> {
        let target = confirmed(id)?;
        self.enter(Operation::DeleteSubtask, Some(target)).await?;
        let mut state = lock(&self.state);
        for task in &mut state.tasks {
            if let Some(index) = task.subtasks.iter().position(|s| &s.id == id) {
                task.subtasks.remove(index);
                return Ok(());
            }
        }
        Err(not_found(id))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn confirmed<T: IdMarker>(id: &Id<T>) -> Result<String, RemoteError> {
    if id.is_temporary() {
        return Err(RemoteError::UnconfirmedId(id.to_string()));
    }
    Ok(id.to_string())
}

fn not_found<T: IdMarker>(id: &Id<T>) -> RemoteError {
    RemoteError::Status {
        status: 404,
        body: format!("{id} not found"),
    }
}

fn max_int<'a, T: IdMarker + 'a>(ids: impl Iterator<Item = &'a Id<T>>) -> i64 {
    ids.filter_map(|id| match id.server_key() {
        Some(ServerKey::Int(n)) => Some(*n),
        _ => None,
    })
    .max()
    .unwrap_or(0)
}

fn sorted(tasks: &[Task]) -> Vec<Task> {
    let mut tasks = tasks.to_vec();
    tasks.sort_by_key(|t| t.position.unwrap_or(i64::MAX));
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Title;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn new_task(title: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            date: day(),
        }
    }

    #[tokio::test]
    async fn ids_continue_after_seeded_data() {
        let seed = Task::draft(TaskId::server(41), &Title::parse("a").unwrap(), day());
        let remote = InMemoryRemote::with_tasks(vec![seed]);
        let created = remote.create_task(&new_task("b")).await.unwrap().unwrap();
        assert_eq!(created.id, TaskId::server(42));
    }

    #[tokio::test]
    async fn deleting_a_task_drops_its_subtasks() {
        let remote = InMemoryRemote::new();
        let task = remote.create_task(&new_task("a")).await.unwrap().unwrap();
        let subtask = remote
            .create_subtask(&NewSubtask {
                todo_id: task.id.clone(),
                title: "a1".into(),
            })
            .await
            .unwrap()
            .unwrap();

        remote.delete_task(&task.id).await.unwrap();
        assert!(remote.tasks().is_empty());
        assert!(matches!(
            remote.toggle_subtask(&subtask.id).await,
            Err(RemoteError::Status { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn positions_drive_list_order() {
        let remote = InMemoryRemote::new();
        let a = remote.create_task(&new_task("a")).await.unwrap().unwrap();
        let b = remote.create_task(&new_task("b")).await.unwrap().unwrap();

        remote
            .persist_positions(&[
                Position { id: b.id.clone(), position: 0 },
                Position { id: a.id.clone(), position: 1 },
            ])
            .await
            .unwrap();

        let listed = remote.list_tasks().await.unwrap().unwrap();
        let ids: Vec<TaskId> = listed.into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn injected_faults() {
        let remote = InMemoryRemote::new();

        remote.fail_next(1);
        assert_eq!(
            remote.create_task(&new_task("a")).await.unwrap_err().kind(),
            crate::domain::ErrorKind::Transient
        );
        assert!(remote.create_task(&new_task("a")).await.unwrap().is_some());

        remote.set_malformed(true);
        assert_eq!(remote.create_task(&new_task("b")).await.unwrap(), None);
        assert_eq!(remote.tasks().len(), 2, "malformed responses still apply");

        remote.set_offline(true);
        assert!(matches!(
            remote.list_tasks().await,
            Err(RemoteError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn temporary_ids_are_refused_and_not_logged() {
        let remote = InMemoryRemote::new();
        let temp = TaskId::temporary(Ulid::new());
        assert!(matches!(
            remote.toggle_task(&temp).await,
            Err(RemoteError::UnconfirmedId(_))
        ));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn held_requests_wait_for_release() {
        let remote = std::sync::Arc::new(InMemoryRemote::new());
        remote.hold_requests();

        let call = tokio::spawn({
            let remote = remote.clone();
            async move { remote.create_task(&new_task("a")).await }
        });
        remote.wait_for_pending(1).await;
        assert!(remote.tasks().is_empty());

        remote.resume();
        assert!(call.await.unwrap().unwrap().is_some());
        assert_eq!(remote.tasks().len(), 1);
    }
}
