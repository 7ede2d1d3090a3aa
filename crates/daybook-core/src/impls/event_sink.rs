//! EventSink の実装

use std::sync::{Mutex, PoisonError};

use tracing::{info, warn};

use crate::domain::SyncEvent;
use crate::ports::EventSink;

/// 何もしない
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: SyncEvent) {}
}

/// tracing に流す。失敗は warn、それ以外は info
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: SyncEvent) {
        if event.is_failure() {
            warn!(target: "daybook::events", %event, "sync failure");
        } else {
            info!(target: "daybook::events", %event, "sync event");
        }
    }
}

/// イベントを記録する（テスト・CLI 用）
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.lock().clone()
    }

    /// ユーザーに見せる失敗通知だけ
    pub fn failures(&self) -> Vec<SyncEvent> {
        self.lock()
            .iter()
            .filter(|e| e.is_failure())
            .cloned()
            .collect()
    }

    /// 記録を取り出して空にする
    pub fn drain(&self) -> Vec<SyncEvent> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SyncEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: SyncEvent) {
        self.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Operation;

    #[test]
    fn memory_sink_records_and_drains() {
        let sink = MemoryEventSink::new();
        sink.emit(SyncEvent::Loaded { count: 2 });
        sink.emit(SyncEvent::RolledBack {
            op: Operation::DeleteTask,
            entity: "task-1".into(),
            reason: "offline".into(),
        });

        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.failures().len(), 1);
        assert_eq!(sink.drain().len(), 2);
        assert!(sink.events().is_empty());
    }
}
