//! InFlight - エンティティごとの同時実行ガード
//!
//! 同じエンティティへの 2 つ目の変更は、1 つ目の結果が出るまで拒否します。
//! 拒否は同期的で、ストアにも Remote にも触れません。
//!
//! タスク削除は配下のサブタスクもまとめて確保します。削除中のタスクの
//! サブタスク操作と、サブタスク操作中のタスク削除はどちらも拒否されます。

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use super::command::EntityKey;
use crate::domain::TaskId;

#[derive(Debug, Default)]
struct Claims {
    keys: HashSet<EntityKey>,
    /// 配下ごと確保されているタスク
    trees: HashSet<TaskId>,
}

impl Claims {
    fn conflicts(&self, key: &EntityKey, covers_subtasks: bool) -> bool {
        if self.keys.contains(key) {
            return true;
        }
        match key {
            EntityKey::Task(id) if covers_subtasks => self
                .keys
                .iter()
                .any(|held| matches!(held, EntityKey::Subtask(parent, _) if parent == id)),
            EntityKey::Subtask(parent, _) => self.trees.contains(parent),
            EntityKey::Task(_) => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct InFlight {
    claims: Arc<Mutex<Claims>>,
}

impl InFlight {
    /// 空いていればキーを確保する。ガードを drop すると解放
    pub(crate) fn claim(&self, key: EntityKey, covers_subtasks: bool) -> Option<InFlightGuard> {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        if claims.conflicts(&key, covers_subtasks) {
            return None;
        }
        let tree = match &key {
            EntityKey::Task(id) if covers_subtasks => Some(id.clone()),
            _ => None,
        };
        if let Some(id) = &tree {
            claims.trees.insert(id.clone());
        }
        claims.keys.insert(key.clone());
        Some(InFlightGuard {
            claims: Arc::clone(&self.claims),
            key,
            tree,
        })
    }
}

#[derive(Debug)]
pub(crate) struct InFlightGuard {
    claims: Arc<Mutex<Claims>>,
    key: EntityKey,
    tree: Option<TaskId>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        claims.keys.remove(&self.key);
        if let Some(id) = &self.tree {
            claims.trees.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SubtaskId;

    fn subtask(task: i64, id: &str) -> EntityKey {
        EntityKey::Subtask(TaskId::server(task), SubtaskId::server(id))
    }

    #[test]
    fn second_claim_is_refused_until_release() {
        let in_flight = InFlight::default();
        let key = EntityKey::Task(TaskId::server(1));

        let guard = in_flight.claim(key.clone(), false).unwrap();
        assert!(in_flight.claim(key.clone(), false).is_none());

        drop(guard);
        assert!(in_flight.claim(key, false).is_some());
    }

    #[test]
    fn different_entities_do_not_block_each_other() {
        let in_flight = InFlight::default();
        let _a = in_flight
            .claim(EntityKey::Task(TaskId::server(1)), false)
            .unwrap();
        assert!(
            in_flight
                .claim(EntityKey::Task(TaskId::server(2)), false)
                .is_some()
        );
    }

    #[test]
    fn same_subtask_id_under_different_parents_does_not_block() {
        let in_flight = InFlight::default();
        let _first = in_flight.claim(subtask(1, "s1"), false).unwrap();

        assert!(in_flight.claim(subtask(2, "s1"), false).is_some());
        assert!(in_flight.claim(subtask(1, "s1"), false).is_none());
    }

    #[test]
    fn task_wide_claim_excludes_its_subtasks_both_ways() {
        let in_flight = InFlight::default();
        let parent = EntityKey::Task(TaskId::server(1));

        let child = in_flight.claim(subtask(1, "s1"), false).unwrap();
        assert!(in_flight.claim(parent.clone(), true).is_none());
        // a plain task claim only conflicts with the task itself
        drop(in_flight.claim(parent.clone(), false).unwrap());
        drop(child);

        let _whole = in_flight.claim(parent, true).unwrap();
        assert!(in_flight.claim(subtask(1, "s2"), false).is_none());
        assert!(in_flight.claim(subtask(2, "s1"), false).is_some());
    }

    #[test]
    fn releasing_a_task_wide_claim_frees_its_subtasks() {
        let in_flight = InFlight::default();
        let whole = in_flight
            .claim(EntityKey::Task(TaskId::server(1)), true)
            .unwrap();
        drop(whole);
        assert!(in_flight.claim(subtask(1, "s1"), false).is_some());
    }
}
