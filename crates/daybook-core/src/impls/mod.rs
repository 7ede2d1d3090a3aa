//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **HttpRemote**: reqwest による Remote Task Service（本番用）
//! - **InMemoryRemote**: プロセス内の Remote Task Service（開発・テスト用、障害注入つき）
//! - **NoopEventSink / TracingEventSink / MemoryEventSink**: EventSink

pub mod event_sink;
pub mod http_remote;
pub mod inmem_remote;

pub use self::event_sink::{MemoryEventSink, NoopEventSink, TracingEventSink};
pub use self::http_remote::{HttpRemote, extract_data};
pub use self::inmem_remote::{InMemoryRemote, RemoteCall};
