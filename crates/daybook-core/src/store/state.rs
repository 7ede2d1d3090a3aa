//! In-memory ordered collection of tasks.

use std::collections::HashMap;

use crate::domain::{Position, Subtask, SubtaskId, Task, TaskId, ValidationError};

/// Local State Store.
///
/// Holds the ordered top-level tasks, each with its ordered subtasks. Every
/// operation is synchronous and only touches the held collection.
///
/// Lookups by id that miss are no-ops rather than errors: a racing delete may
/// already have removed the entity an in-flight confirmation refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn index_of(&self, id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| &t.id == id)
    }

    /// Full replace after the initial load.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    /// Appends to the end of the collection.
    pub fn insert(&mut self, task: Task) {
        self.tasks.push(task);
    }

    /// Inserts at `index`, clamped to the current length.
    pub fn insert_at(&mut self, index: usize, task: Task) {
        let index = index.min(self.tasks.len());
        self.tasks.insert(index, task);
    }

    /// Swaps the entity matching `id` for `task`, keeping its position.
    ///
    /// Used to exchange a temporary id for the server-assigned one. If some
    /// other entry already carries the new id (e.g. a reload raced the
    /// create), that entry is dropped so ids stay unique.
    pub fn replace_by_id(&mut self, id: &TaskId, task: Task) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        if &task.id != id
            && let Some(dup) = self.index_of(&task.id)
        {
            self.tasks.remove(dup);
            let index = if dup < index { index - 1 } else { index };
            self.tasks[index] = task;
            return true;
        }
        self.tasks[index] = task;
        true
    }

    /// Applies `patch` to the entity matching `id`. Returns `false` (and does
    /// nothing) when it is absent.
    pub fn update_by_id<F>(&mut self, id: &TaskId, patch: F) -> bool
    where
        F: FnOnce(&mut Task),
    {
        match self.tasks.iter_mut().find(|t| &t.id == id) {
            Some(task) => {
                patch(task);
                true
            }
            None => false,
        }
    }

    /// Removes the entity matching `id`, returning it with its former index.
    pub fn remove_by_id(&mut self, id: &TaskId) -> Option<(usize, Task)> {
        let index = self.index_of(id)?;
        Some((index, self.tasks.remove(index)))
    }

    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    /// Wholesale replace with a previously taken snapshot.
    pub fn set_snapshot(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    /// Rearranges the top-level tasks into `new_order`.
    ///
    /// `new_order` must name every current task exactly once. Subtasks travel
    /// with their parent and keep their own order.
    pub fn reorder(&mut self, new_order: &[TaskId]) -> Result<(), ValidationError> {
        if new_order.len() != self.tasks.len() {
            return Err(ValidationError::NotAPermutation);
        }

        let current: HashMap<&TaskId, usize> = self
            .tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (&t.id, i))
            .collect();

        let mut indices = Vec::with_capacity(new_order.len());
        let mut seen = vec![false; self.tasks.len()];
        for id in new_order {
            let Some(&i) = current.get(id) else {
                return Err(ValidationError::NotAPermutation);
            };
            if std::mem::replace(&mut seen[i], true) {
                return Err(ValidationError::NotAPermutation);
            }
            indices.push(i);
        }

        let mut slots: Vec<Option<Task>> = self.tasks.drain(..).map(Some).collect();
        self.tasks = indices
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect();
        Ok(())
    }

    /// `{id, position}` for every confirmed task, in store order.
    ///
    /// Tasks still holding a temporary id are left out; the service appends
    /// them when their create lands.
    pub fn positions(&self) -> Vec<Position> {
        self.tasks
            .iter()
            .filter(|t| !t.id.is_temporary())
            .enumerate()
            .map(|(position, t)| Position {
                id: t.id.clone(),
                position,
            })
            .collect()
    }

    // ---- subtasks ----

    pub fn push_subtask(&mut self, task_id: &TaskId, subtask: Subtask) -> bool {
        self.update_by_id(task_id, |task| task.subtasks.push(subtask))
    }

    pub fn insert_subtask_at(&mut self, task_id: &TaskId, index: usize, subtask: Subtask) -> bool {
        self.update_by_id(task_id, |task| {
            let index = index.min(task.subtasks.len());
            task.subtasks.insert(index, subtask);
        })
    }

    pub fn update_subtask<F>(&mut self, task_id: &TaskId, subtask_id: &SubtaskId, patch: F) -> bool
    where
        F: FnOnce(&mut Subtask),
    {
        let Some(task) = self.tasks.iter_mut().find(|t| &t.id == task_id) else {
            return false;
        };
        match task.subtask_mut(subtask_id) {
            Some(subtask) => {
                patch(subtask);
                true
            }
            None => false,
        }
    }

    pub fn replace_subtask(
        &mut self,
        task_id: &TaskId,
        subtask_id: &SubtaskId,
        subtask: Subtask,
    ) -> bool {
        self.update_subtask(task_id, subtask_id, |slot| *slot = subtask)
    }

    pub fn remove_subtask(
        &mut self,
        task_id: &TaskId,
        subtask_id: &SubtaskId,
    ) -> Option<(usize, Subtask)> {
        let task = self.tasks.iter_mut().find(|t| &t.id == task_id)?;
        let index = task.subtasks.iter().position(|s| &s.id == subtask_id)?;
        Some((index, task.subtasks.remove(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Title;
    use chrono::NaiveDate;
    use rstest::rstest;
    use ulid::Ulid;

    fn task(id: i64) -> Task {
        Task::draft(
            TaskId::server(id),
            &Title::parse(&format!("task {id}")).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        )
    }

    fn store_of(n: i64) -> TaskStore {
        TaskStore::from_tasks((1..=n).map(task).collect())
    }

    fn ids(store: &TaskStore) -> Vec<TaskId> {
        store.tasks().iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn insert_appends_to_the_end() {
        let mut store = store_of(2);
        store.insert(task(9));
        assert_eq!(store.tasks().last().unwrap().id, TaskId::server(9));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn insert_at_clamps_index() {
        let mut store = store_of(2);
        store.insert_at(99, task(9));
        assert_eq!(store.index_of(&TaskId::server(9)), Some(2));
        store.insert_at(0, task(8));
        assert_eq!(store.index_of(&TaskId::server(8)), Some(0));
    }

    #[test]
    fn update_by_missing_id_is_a_noop() {
        let mut store = store_of(2);
        let before = store.clone();
        assert!(!store.update_by_id(&TaskId::server(42), |t| t.completed = true));
        assert_eq!(store, before);
    }

    #[test]
    fn update_by_id_patches_only_the_match() {
        let mut store = store_of(3);
        assert!(store.update_by_id(&TaskId::server(2), |t| t.completed = true));
        let flags: Vec<bool> = store.tasks().iter().map(|t| t.completed).collect();
        assert_eq!(flags, vec![false, true, false]);
    }

    #[rstest]
    #[case::first(1)]
    #[case::middle(3)]
    #[case::last(5)]
    fn remove_by_id_removes_exactly_one(#[case] target: i64) {
        let mut store = store_of(5);
        let (index, removed) = store.remove_by_id(&TaskId::server(target)).unwrap();
        assert_eq!(removed.id, TaskId::server(target));
        assert_eq!(index as i64, target - 1);

        let remaining = ids(&store);
        assert_eq!(remaining.len(), 4);
        assert!(!remaining.contains(&TaskId::server(target)));
    }

    #[test]
    fn remove_missing_is_a_noop() {
        let mut store = store_of(2);
        assert!(store.remove_by_id(&TaskId::server(7)).is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn replace_by_id_exchanges_temporary_id_in_place() {
        let mut store = store_of(2);
        let temp = TaskId::temporary(Ulid::new());
        let mut draft = task(0);
        draft.id = temp.clone();
        store.insert_at(1, draft);

        assert!(store.replace_by_id(&temp, task(10)));
        assert_eq!(
            ids(&store),
            vec![TaskId::server(1), TaskId::server(10), TaskId::server(2)]
        );
    }

    #[test]
    fn replace_by_id_keeps_ids_unique() {
        let mut store = store_of(2);
        let temp = TaskId::temporary(Ulid::new());
        let mut draft = task(0);
        draft.id = temp.clone();
        store.insert(draft);

        // the canonical id is already present (a reload got there first)
        assert!(store.replace_by_id(&temp, task(1)));
        assert_eq!(ids(&store), vec![TaskId::server(2), TaskId::server(1)]);
    }

    #[test]
    fn reorder_applies_a_permutation() {
        let mut store = store_of(3);
        store.push_subtask(
            &TaskId::server(1),
            Subtask::draft(SubtaskId::server(7), &Title::parse("s").unwrap()),
        );
        let order = vec![TaskId::server(3), TaskId::server(1), TaskId::server(2)];
        store.reorder(&order).unwrap();
        assert_eq!(ids(&store), order);
        assert_eq!(store.get(&TaskId::server(1)).unwrap().subtasks.len(), 1);
    }

    #[rstest]
    #[case::too_short(vec![1, 2])]
    #[case::duplicate(vec![1, 1, 2])]
    #[case::unknown(vec![1, 2, 4])]
    fn reorder_rejects_non_permutations(#[case] order: Vec<i64>) {
        let mut store = store_of(3);
        let before = store.clone();
        let order: Vec<TaskId> = order.into_iter().map(TaskId::server).collect();
        assert_eq!(store.reorder(&order), Err(ValidationError::NotAPermutation));
        assert_eq!(store, before);
    }

    #[test]
    fn positions_skip_temporary_tasks() {
        let mut store = store_of(2);
        let mut draft = task(0);
        draft.id = TaskId::temporary(Ulid::new());
        store.insert_at(0, draft);

        let positions = store.positions();
        assert_eq!(
            positions,
            vec![
                Position { id: TaskId::server(1), position: 0 },
                Position { id: TaskId::server(2), position: 1 },
            ]
        );
    }

    #[test]
    fn snapshot_round_trip() {
        let mut store = store_of(3);
        let snap = store.snapshot();
        store.remove_by_id(&TaskId::server(2));
        store.set_snapshot(snap);
        assert_eq!(store, store_of(3));
    }

    #[test]
    fn subtask_helpers_ignore_missing_parent() {
        let mut store = store_of(1);
        let title = Title::parse("s").unwrap();
        let missing = TaskId::server(99);

        assert!(!store.push_subtask(&missing, Subtask::draft(SubtaskId::server(1), &title)));
        assert!(!store.update_subtask(&missing, &SubtaskId::server(1), |s| s.completed = true));
        assert!(store.remove_subtask(&missing, &SubtaskId::server(1)).is_none());
        assert_eq!(store, store_of(1));
    }

    #[test]
    fn subtasks_keep_insertion_order() {
        let mut store = store_of(1);
        let parent = TaskId::server(1);
        for n in 1..=3 {
            let title = Title::parse(&format!("s{n}")).unwrap();
            store.push_subtask(&parent, Subtask::draft(SubtaskId::server(n), &title));
        }
        let (index, removed) = store.remove_subtask(&parent, &SubtaskId::server(2)).unwrap();
        assert_eq!(index, 1);
        store.insert_subtask_at(&parent, index, removed);

        let order: Vec<String> = store
            .get(&parent)
            .unwrap()
            .subtasks
            .iter()
            .map(|s| s.title.clone())
            .collect();
        assert_eq!(order, vec!["s1", "s2", "s3"]);
    }
}
