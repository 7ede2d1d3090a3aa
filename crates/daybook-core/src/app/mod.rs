//! App - アプリケーション層
//!
//! ports を組み合わせて同期プロトコルを実装します。
//!
//! # 主要コンポーネント
//! - **SynchronizerBuilder**: port のワイヤリング
//! - **Synchronizer**: 楽観的更新・確定・ロールバック
//! - **Command**: 操作ごとの 2 フェーズコマンド（スナップショットと復元）

pub mod builder;
pub mod command;
mod in_flight;
pub mod synchronizer;

pub use self::builder::SynchronizerBuilder;
pub use self::command::{Command, EntityKey, Reply, Snapshot};
pub use self::synchronizer::{LoadOutcome, MutationOutcome, ReorderOutcome, Synchronizer};
