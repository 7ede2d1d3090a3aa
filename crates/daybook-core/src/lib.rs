//! daybook-core
//!
//! Optimistic sync core for a day-planner task list.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, title, errors, events）
//! - **store**: Local State Store と読み取り用の投影（filter, progress）
//! - **ports**: 抽象化レイヤー（RemoteTaskService, IdGenerator, Clock, EventSink）
//! - **app**: 同期プロトコル（SynchronizerBuilder, Synchronizer, Command）
//! - **impls**: 実装（HttpRemote, InMemoryRemote, EventSink 各種）
//! - **config**: 設定（TOML + 環境変数）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod store;

pub use app::{
    LoadOutcome, MutationOutcome, ReorderOutcome, Synchronizer, SynchronizerBuilder,
};
pub use config::{ConfigError, SyncConfig};
pub use domain::{RemoteError, SubtaskId, SyncError, SyncEvent, Task, TaskId, ValidationError};
pub use store::{SharedStore, StatusFilter, TaskFilter, TaskStore};
