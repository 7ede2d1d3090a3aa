//! Errors - エラー型と分類
//!
//! - **RemoteError**: Remote Task Service との通信失敗。Synchronizer の境界で
//!   吸収され、ロールバック + 通知に変換される（呼び出し側には漏れない）
//! - **ValidationError**: 入力不正。ストア変更・通信の前に同期的に拒否
//! - **SyncError**: Synchronizer が呼び出し側に返す唯一のエラー

use thiserror::Error;

/// ErrorKind は通信エラーの分類
///
/// - Transient: 一時的なエラー（ネットワーク断、5xx、タイムアウト）
/// - Permanent: 恒久的なエラー（4xx、一時 ID の送信など）
///
/// どちらも自動リトライはしない。分類はログと通知の文言にのみ使う。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("service responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("{0} has not been confirmed by the service yet")]
    UnconfirmedId(String),
}

impl RemoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemoteError::Transport(_) => ErrorKind::Transient,
            RemoteError::Status { status, .. } if *status >= 500 || *status == 429 => {
                ErrorKind::Transient
            }
            RemoteError::Status { .. } => ErrorKind::Permanent,
            RemoteError::Decode(_) => ErrorKind::Transient,
            RemoteError::UnconfirmedId(_) => ErrorKind::Permanent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("{0} is still waiting for the service to assign an id")]
    UnconfirmedEntity(String),

    #[error("new order must be a permutation of the current tasks")]
    NotAPermutation,

    #[error("{0} is not in the store")]
    UnknownTask(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Another mutation on the same entity has not been confirmed yet.
    #[error("{0} already has a request in flight")]
    Busy(String),
}
