//! Handler trait - Function を実行する Handler の定義
//!
//! - `Handler<F>`: 型付きの表層（`F` 以外は受け取れない）
//! - `DynHandler`: object-safe な内部表現（registry に格納する）
//! - `TypedHandler<F, H>`: 位置引数を `F` にデコードしてから `H` を呼ぶ

use std::marker::PhantomData;

use async_trait::async_trait;

use super::function::Function;
use crate::domain::TaskExecutionError;

/// Executes one call of `F`.
///
/// ```ignore
/// struct Renderer;
///
/// #[async_trait]
/// impl Handler<CreatePdf> for Renderer {
///     async fn handle(&self, call: CreatePdf) -> Result<(), TaskExecutionError> {
///         render(call.entry_id, &call.pdf_id).await.map_err(TaskExecutionError::failed)
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<F: Function>: Send + Sync {
    async fn handle(&self, call: F) -> Result<(), TaskExecutionError>;
}

/// Object-safe handler working on raw positional args.
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn call(&self, args: Vec<serde_json::Value>) -> Result<(), TaskExecutionError>;

    fn function_name(&self) -> &str;
}

pub struct TypedHandler<F: Function, H: Handler<F>> {
    handler: H,
    _marker: PhantomData<F>,
}

impl<F: Function, H: Handler<F>> TypedHandler<F, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F: Function, H: Handler<F>> DynHandler for TypedHandler<F, H> {
    async fn call(&self, args: Vec<serde_json::Value>) -> Result<(), TaskExecutionError> {
        let call: F = serde_json::from_value(serde_json::Value::Array(args))
            .map_err(|e| TaskExecutionError::InvalidArgs(e.to_string()))?;
        self.handler.handle(call).await
    }

    fn function_name(&self) -> &str {
        F::NAME
    }
}
