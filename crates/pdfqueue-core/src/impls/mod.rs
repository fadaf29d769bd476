//! Impls - ports の実装
//!
//! - **InMemoryStore**: テスト・開発用の RecordStore
//! - **SledStore**: sled による永続 RecordStore

pub mod memory_store;
pub mod sled_store;

pub use self::memory_store::InMemoryStore;
pub use self::sled_store::SledStore;
