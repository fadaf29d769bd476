//! Typed - 型付き function API
//!
//! function 名の typo を型で排除し、Handler との対応付けを静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `Function` trait, `Handler<F>` trait - 型安全
//! - **内部（Dyn）**: `DynHandler` trait - object-safe, type erasure

pub mod function;
pub mod handler;
pub mod registry;

pub use self::function::{CleanupPdfs, CreatePdf, Function, Notification, SendNotification};
pub use self::handler::{DynHandler, Handler, TypedHandler};
pub use self::registry::{FunctionRegistry, RegistryError};
