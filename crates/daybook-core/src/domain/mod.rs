//! Domain model (IDs, entities, errors, events).
//!
//! ストアや通信に依存しない純粋な型だけを置きます。

pub mod errors;
pub mod events;
pub mod ids;
pub mod task;
pub mod title;

pub use self::errors::{ErrorKind, RemoteError, SyncError, ValidationError};
pub use self::events::{Operation, SyncEvent};
pub use self::ids::{Id, IdKey, IdMarker, ServerKey, SubtaskId, SubtaskKind, TaskId, TaskKind};
pub use self::task::{NewSubtask, NewTask, Position, Subtask, Task, parse_day};
pub use self::title::Title;
