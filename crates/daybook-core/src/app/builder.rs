//! SynchronizerBuilder - Synchronizer の構築とワイヤリング
//!
//! Remote だけ必須で、他の port は省略すると本番向けの既定値になります。
//!
//! | port | 既定値 |
//! |---|---|
//! | store | 空の SharedStore |
//! | IdGenerator | `UlidGenerator<SystemClock>` |
//! | Clock | `SystemClock` |
//! | EventSink | `TracingEventSink` |

use std::sync::Arc;

use super::synchronizer::Synchronizer;
use crate::impls::TracingEventSink;
use crate::ports::{Clock, EventSink, IdGenerator, RemoteTaskService, SystemClock, UlidGenerator};
use crate::store::SharedStore;

/// # 使用例
/// ```ignore
/// let sync = SynchronizerBuilder::new(Arc::new(HttpRemote::from_config(&config)?))
///     .event_sink(Arc::new(MemoryEventSink::new()))
///     .build();
/// sync.load().await;
/// ```
pub struct SynchronizerBuilder<R> {
    remote: Arc<R>,
    store: Option<SharedStore>,
    ids: Option<Arc<dyn IdGenerator>>,
    clock: Option<Arc<dyn Clock>>,
    events: Option<Arc<dyn EventSink>>,
}

impl<R: RemoteTaskService> SynchronizerBuilder<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self {
            remote,
            store: None,
            ids: None,
            clock: None,
            events: None,
        }
    }

    /// 既存のストアを共有する（読み手が先にハンドルを持っている場合）
    pub fn store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Synchronizer<R> {
        Synchronizer::from_parts(
            self.remote,
            self.store.unwrap_or_default(),
            self.ids
                .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock))),
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            self.events.unwrap_or_else(|| Arc::new(TracingEventSink)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Task, TaskId, Title};
    use crate::impls::InMemoryRemote;
    use crate::store::TaskStore;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn shared_store_is_visible_to_readers_built_before_the_synchronizer() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let seed = Task::draft(TaskId::server(1), &Title::parse("a").unwrap(), day);
        let reader = SharedStore::new(TaskStore::new());

        let sync = SynchronizerBuilder::new(Arc::new(InMemoryRemote::with_tasks(vec![seed])))
            .store(reader.clone())
            .build();
        sync.load().await;

        assert_eq!(reader.read().await.len(), 1);
    }

    #[tokio::test]
    async fn defaults_generate_temporary_ids_that_are_replaced() {
        let sync = SynchronizerBuilder::new(Arc::new(InMemoryRemote::new())).build();
        sync.create_task("x", None).await.unwrap();
        let tasks = sync.store().tasks().await;
        assert_eq!(tasks.len(), 1);
        assert!(!tasks[0].id.is_temporary());
    }
}
