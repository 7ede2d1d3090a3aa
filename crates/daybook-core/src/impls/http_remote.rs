//! HttpRemote - reqwest による Remote Task Service
//!
//! 同一オリジンの転送エンドポイント（例: `http://localhost:3000/api/proxy`）
//! に JSON で話します。
//!
//! # 応答の扱い
//! - 非 2xx → `RemoteError::Status`
//! - 接続失敗・タイムアウト → `RemoteError::Transport`
//! - `{ "data": ... }` で包まれていれば中身を使う
//! - 期待した形でなければ `Ok(None)`（警告ログのみ）

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::domain::{
    Id, IdMarker, NewSubtask, NewTask, Position, RemoteError, Subtask, SubtaskId, Task, TaskId,
};
use crate::ports::RemoteTaskService;

#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, RemoteError> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<Option<T>, RemoteError> {
        let response = send(request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(decode(&bytes, what))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<(), RemoteError> {
        send(request).await.map(drop)
    }
}

#[async_trait]
impl RemoteTaskService for HttpRemote {
    async fn list_tasks(&self) -> Result<Option<Vec<Task>>, RemoteError> {
        self.fetch(self.client.get(self.url("/todos")), "task list")
            .await
    }

    async fn create_task(&self, new_task: &NewTask) -> Result<Option<Task>, RemoteError> {
        let request = self.client.post(self.url("/todos")).json(new_task);
        self.fetch(request, "created task").await
    }

    async fn toggle_task(&self, id: &TaskId) -> Result<Option<Task>, RemoteError> {
        let path = format!("/todos/{}/toggle", path_id(id)?);
        self.fetch(self.client.patch(self.url(&path)), "toggled task")
            .await
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), RemoteError> {
        let path = format!("/todos/{}", path_id(id)?);
        self.execute(self.client.delete(self.url(&path))).await
    }

    async fn persist_positions(&self, positions: &[Position]) -> Result<(), RemoteError> {
        for entry in positions {
            path_id(&entry.id)?;
        }
        let request = self
            .client
            .patch(self.url("/todos/reorder/positions"))
            .json(&json!({ "positions": positions }));
        self.execute(request).await
    }

    async fn create_subtask(
        &self,
        new_subtask: &NewSubtask,
    ) -> Result<Option<Subtask>, RemoteError> {
        path_id(&new_subtask.todo_id)?;
        let request = self.client.post(self.url("/subtasks")).json(new_subtask);
        self.fetch(request, "created subtask").await
    }

    async fn toggle_subtask(&self, id: &SubtaskId) -> Result<Option<Subtask>, RemoteError> {
        let path = format!("/subtasks/{}/toggle", path_id(id)?);
        self.fetch(self.client.patch(self.url(&path)), "toggled subtask")
            .await
    }

    async fn delete_subtask(&self, id: &SubtaskId) -> Result<(), RemoteError> {
        let path = format!("/subtasks/{}", path_id(id)?);
        self.execute(self.client.delete(self.url(&path))).await
    }
}

async fn send(request: RequestBuilder) -> Result<Response, RemoteError> {
    let response = request.send().await.map_err(transport)?;
    let status = response.status();
    debug!(url = %response.url(), %status, "response");
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        status: status.as_u16(),
        body,
    })
}

fn transport(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Transport(format!("timed out: {err}"))
    } else {
        RemoteError::Transport(err.to_string())
    }
}

/// The wire id of a confirmed entity; temporary ids never leave the process.
fn path_id<T: IdMarker>(id: &Id<T>) -> Result<String, RemoteError> {
    id.server_key()
        .map(ToString::to_string)
        .ok_or_else(|| RemoteError::UnconfirmedId(id.to_string()))
}

/// `{ "data": x }` → `x`; anything else is returned as is.
pub fn extract_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Option<T> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        warn!(what, "empty response body");
        return None;
    }
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(err) => {
            warn!(what, error = %err, "response is not JSON");
            return None;
        }
    };
    match serde_json::from_value(extract_data(value)) {
        Ok(payload) => Some(payload),
        Err(err) => {
            warn!(what, error = %err, "unexpected response shape");
            None
        }
    }
}
