//! App - アプリケーション層
//!
//! queue engine（repository, lock, processor）を組み合わせて、
//! 外側（HTTP, producer）に見せる操作を実装します。
//!
//! # 主要コンポーネント
//! - **QueueBuilder**: ワイヤリングと起動時検証
//! - **Dispatcher**: processor を queue が空になるまで回す background task
//! - **ControlApi**: list / run / delete
//! - **StatusProjector**: UI 向けの表示データ
//! - **QueueClient**: producer 用の enqueue

pub mod builder;
pub mod client;
pub mod control;
pub mod dispatcher;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, QueueBuilder, QueueRuntime};
pub use self::client::{NewTask, QueueClient};
pub use self::control::ControlApi;
pub use self::dispatcher::{ChainEnd, ChainReport, DispatchError, Dispatcher};
pub use self::status::{ArgsFormatter, QueueStatus, StatusProjector, StatusRow};
