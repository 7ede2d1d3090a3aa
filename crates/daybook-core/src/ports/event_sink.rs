//! EventSink port - 同期イベントの通知先
//!
//! 失敗（ロールバック等）はここを通ってユーザーに届きます。
//! Synchronizer はイベントを送るだけで、表示方法は実装に任せます。

use crate::domain::SyncEvent;

/// EventSink は SyncEvent を受け取る
///
/// # 実装
/// - NoopEventSink: 何もしない
/// - TracingEventSink: tracing に流す
/// - MemoryEventSink: 記録する（テスト・CLI 用）
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}
