//! IdGenerator port - 一時 ID 生成の抽象化
//!
//! 楽観的作成の間だけ使う一時 ID を生成します。
//! 一時 ID はサーバー ID と別の variant なので衝突しません。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）
//! - **SequentialIdGenerator**: カウンタベース（テスト用、決定的）

use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::ids::{SubtaskId, TaskId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は一時 ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数タスクから使える）
pub trait IdGenerator: Send + Sync {
    /// 一時 Task ID を生成
    fn temporary_task_id(&self) -> TaskId;

    /// 一時 Subtask ID を生成
    fn temporary_subtask_id(&self) -> SubtaskId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// 同じミリ秒内でもランダム部分（80 bit）で区別されます。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn temporary_task_id(&self) -> TaskId {
        TaskId::temporary(self.next_ulid())
    }

    fn temporary_subtask_id(&self) -> SubtaskId {
        SubtaskId::temporary(self.next_ulid())
    }
}

/// 単調増加カウンタで一時 ID を生成
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_ulid(&self) -> Ulid {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Ulid::from_parts(0, u128::from(n))
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn temporary_task_id(&self) -> TaskId {
        TaskId::temporary(self.next_ulid())
    }

    fn temporary_subtask_id(&self) -> SubtaskId {
        SubtaskId::temporary(self.next_ulid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IdKey;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.temporary_task_id();
        let id2 = id_gen.temporary_task_id();
        let id3 = id_gen.temporary_task_id();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
        assert!(id1.is_temporary());
    }

    #[test]
    fn ulid_generator_with_fixed_clock_shares_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.temporary_subtask_id();
        let id2 = id_gen.temporary_subtask_id();

        // FixedClock を使っても、ランダム部分があるので ID は異なる
        assert_ne!(id1, id2);

        let (IdKey::Temporary(u1), IdKey::Temporary(u2)) = (id1.key(), id2.key()) else {
            panic!("expected temporary ids");
        };
        assert_eq!(u1.timestamp_ms(), u2.timestamp_ms());
        assert_eq!(u1.timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }

    #[test]
    fn sequential_generator_is_deterministic() {
        let a = SequentialIdGenerator::new();
        let b = SequentialIdGenerator::new();
        assert_eq!(a.temporary_task_id(), b.temporary_task_id());
        assert_ne!(a.temporary_task_id(), a.temporary_task_id());
        assert!(a.temporary_subtask_id().to_string().starts_with("subtask-tmp-"));
    }
}
