//! pdfqueue-core
//!
//! PDF 生成などの重い処理を web request から切り離すための、永続化された background job queue。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, batch, errors）
//! - **ports**: 抽象化レイヤー（RecordStore, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryStore, SledStore）
//! - **queue**: 実行エンジン（BatchRepository, ProcessLock, RetryPolicy, QueueProcessor）
//! - **app**: アプリケーションロジック（QueueBuilder, Dispatcher, ControlApi, StatusProjector, QueueClient）
//! - **typed**: 型付き function API（Function trait, Handler trait, FunctionRegistry）
//! - **config**: QueueConfig

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod typed;

#[cfg(test)]
mod testing;

pub use self::app::{BuildError, ControlApi, QueueBuilder, QueueRuntime, QueueStatus};
pub use self::config::QueueConfig;
pub use self::domain::QueueError;
