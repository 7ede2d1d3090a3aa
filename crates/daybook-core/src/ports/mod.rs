//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部（Remote Task Service、時計、通知先）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - Remote Task Service が正本（durable owner of record）
//! - Local State Store はレンダリングの正本（ports ではなく store モジュール）

pub mod clock;
pub mod event_sink;
pub mod id_generator;
pub mod remote;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::EventSink;
pub use self::id_generator::{IdGenerator, SequentialIdGenerator, UlidGenerator};
pub use self::remote::RemoteTaskService;
