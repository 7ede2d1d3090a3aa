//! RemoteTaskService port - 永続化の正本（durable owner of record）
//!
//! Remote Task Service は同一オリジンの転送エンドポイントの先にある REST API です。
//! コアはリクエスト/レスポンスの契約だけを使います。
//!
//! # 実装
//! - **HttpRemote**: reqwest による本番実装
//! - **InMemoryRemote**: 開発・テスト用（障害注入つき）

use async_trait::async_trait;

use crate::domain::{NewSubtask, NewTask, Position, RemoteError, Subtask, SubtaskId, Task, TaskId};

/// Remote Task Service の契約
///
/// | 操作 | Method | Path |
/// |---|---|---|
/// | list | GET | `/todos` |
/// | create | POST | `/todos` |
/// | toggle | PATCH | `/todos/{id}/toggle` |
/// | delete | DELETE | `/todos/{id}` |
/// | reorder | PATCH | `/todos/reorder/positions` |
/// | create subtask | POST | `/subtasks` |
/// | toggle subtask | PATCH | `/subtasks/{id}/toggle` |
/// | delete subtask | DELETE | `/subtasks/{id}` |
///
/// # 設計原則
/// - ペイロードを返す操作は、応答が無い/形が違う場合 `Ok(None)` を返す
///   （「正本での更新なし」であり、失敗ではない）
/// - 非 2xx と通信エラーは `Err`。リトライはしない
/// - 一時 ID を渡された場合は送信せず `RemoteError::UnconfirmedId`
#[async_trait]
pub trait RemoteTaskService: Send + Sync {
    async fn list_tasks(&self) -> Result<Option<Vec<Task>>, RemoteError>;

    async fn create_task(&self, new_task: &NewTask) -> Result<Option<Task>, RemoteError>;

    async fn toggle_task(&self, id: &TaskId) -> Result<Option<Task>, RemoteError>;

    async fn delete_task(&self, id: &TaskId) -> Result<(), RemoteError>;

    async fn persist_positions(&self, positions: &[Position]) -> Result<(), RemoteError>;

    async fn create_subtask(&self, new_subtask: &NewSubtask)
    -> Result<Option<Subtask>, RemoteError>;

    async fn toggle_subtask(&self, id: &SubtaskId) -> Result<Option<Subtask>, RemoteError>;

    async fn delete_subtask(&self, id: &SubtaskId) -> Result<(), RemoteError>;
}
