//! Queue - バッチの永続化と実行エンジン
//!
//! - **BatchRepository**: batch record の読み書き（唯一の窓口）
//! - **ProcessLock**: 同時に 1 pass だけが queue を処理するための lock
//! - **RetryPolicy**: 失敗した task を戻すか捨てるか
//! - **QueueProcessor**: lock の下で group の先頭 task を順に実行

mod lock;
mod processor;
mod repository;
mod retry;

pub use self::lock::{LockGuard, LockState, ProcessLock};
pub use self::processor::{PassBudget, PassOutcome, QueueProcessor, TaskOutcome};
pub use self::repository::BatchRepository;
pub use self::retry::{RetryDecision, RetryPolicy};
