//! Domain identifiers (strongly-typed IDs).
//!
//! # サーバー ID と一時 ID
//! Task / Subtask の ID は Remote Task Service が採番します。
//! 作成リクエストが返ってくるまでの間は、ローカルで生成した一時 ID
//! （ULID）が代わりに使われ、成功時にサーバー ID と交換されます。
//!
//! - **Server**: サービスが返した値そのもの（JSON の数値または文字列）
//! - **Temporary**: `tmp-<ulid>`。サービスには決して送らない
//!
//! ## Phantom Type パターン
//! `Id<T>` の `T` はマーカー型で、`TaskId` と `SubtaskId` を
//! コンパイル時に区別します（実行時コストはゼロ）。

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

const TEMPORARY_PREFIX: &str = "tmp-";

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"task-", "subtask-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Opaque identifier assigned by the Remote Task Service.
///
/// The service may use integers or strings; we keep whichever it sent so the
/// value round-trips unchanged into request paths and bodies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerKey {
    Int(i64),
    Text(String),
}

impl From<i64> for ServerKey {
    fn from(value: i64) -> Self {
        ServerKey::Int(value)
    }
}

impl From<&str> for ServerKey {
    fn from(value: &str) -> Self {
        ServerKey::Text(value.to_string())
    }
}

impl From<String> for ServerKey {
    fn from(value: String) -> Self {
        ServerKey::Text(value)
    }
}

impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerKey::Int(n) => write!(f, "{n}"),
            ServerKey::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdKey {
    Server(ServerKey),
    Temporary(Ulid),
}

/// ジェネリック ID 型
///
/// # 例
/// ```ignore
/// let task_id = TaskId::server(42);
/// let temp_id = TaskId::temporary(Ulid::new());
/// assert!(temp_id.is_temporary());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T: IdMarker> {
    key: IdKey,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// サーバーが採番した ID
    pub fn server(key: impl Into<ServerKey>) -> Self {
        Self {
            key: IdKey::Server(key.into()),
            _marker: PhantomData,
        }
    }

    /// 楽観的作成のための一時 ID
    pub fn temporary(ulid: Ulid) -> Self {
        Self {
            key: IdKey::Temporary(ulid),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &IdKey {
        &self.key
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self.key, IdKey::Temporary(_))
    }

    /// Returns the server key, or `None` while the id is still temporary.
    pub fn server_key(&self) -> Option<&ServerKey> {
        match &self.key {
            IdKey::Server(key) => Some(key),
            IdKey::Temporary(_) => None,
        }
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            IdKey::Server(key) => write!(f, "{}{}", T::prefix(), key),
            IdKey::Temporary(ulid) => write!(f, "{}{}{}", T::prefix(), TEMPORARY_PREFIX, ulid),
        }
    }
}

impl<T: IdMarker> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.key {
            IdKey::Server(key) => key.serialize(serializer),
            IdKey::Temporary(ulid) => {
                serializer.collect_str(&format_args!("{TEMPORARY_PREFIX}{ulid}"))
            }
        }
    }
}

impl<'de, T: IdMarker> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = ServerKey::deserialize(deserializer)?;
        // ローカルのスナップショットを読み戻した場合だけ tmp- が現れる
        if let ServerKey::Text(text) = &key
            && let Some(raw) = text.strip_prefix(TEMPORARY_PREFIX)
            && let Ok(ulid) = Ulid::from_string(raw)
        {
            return Ok(Self::temporary(ulid));
        }
        Ok(Self::server(key))
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {}

impl IdMarker for TaskKind {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Subtask のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SubtaskKind {}

impl IdMarker for SubtaskKind {
    fn prefix() -> &'static str {
        "subtask-"
    }
}

/// Identifier of a top-level Task.
pub type TaskId = Id<TaskKind>;

/// Identifier of a Subtask (unique within its parent Task).
pub type SubtaskId = Id<SubtaskKind>;
