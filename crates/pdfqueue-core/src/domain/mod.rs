//! Domain model (ids, tasks, batches, errors).

pub mod batch;
pub mod errors;
pub mod ids;
pub mod task;

pub use self::batch::{Batch, BatchRecord, Groups, PendingBatch};
pub use self::errors::{QueueError, StorageError, TaskExecutionError};
pub use self::ids::{BatchKey, GroupId, Id, IdMarker, TaskId};
pub use self::task::{FunctionRef, Task, TaskGroup};
