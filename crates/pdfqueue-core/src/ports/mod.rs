//! Ports - 抽象化レイヤー
//!
//! queue の engine（processor, control API）は storage の技術を知りません。
//! 時刻・ID 生成・永続化はすべてここで定義する trait 越しに注入します。

pub mod clock;
pub mod id_generator;
pub mod record_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::record_store::RecordStore;
