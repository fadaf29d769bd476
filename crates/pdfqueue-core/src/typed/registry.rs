//! FunctionRegistry - Handler の登録と解決
//!
//! 起動時に登録（mutable）、実行時は読み取りのみ（Arc で共有）。

use std::collections::HashMap;
use std::sync::Arc;

use super::function::Function;
use super::handler::{DynHandler, Handler, TypedHandler};
use crate::domain::FunctionRef;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler for function '{0}' is already registered")]
    AlreadyRegistered(String),
}

#[derive(Default)]
pub struct FunctionRegistry {
    handlers: HashMap<String, Arc<dyn DynHandler>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F: Function, H: Handler<F> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        self.register_dyn(Arc::new(TypedHandler::<F, H>::new(handler)))
    }

    /// Register an untyped handler under its own `function_name()`.
    pub fn register_dyn(&mut self, handler: Arc<dyn DynHandler>) -> Result<(), RegistryError> {
        let name = handler.function_name().to_string();
        if self.handlers.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Resolve a task's function: exact name first, then the name without
    /// its namespace qualifier.
    pub fn resolve(&self, function: &FunctionRef) -> Option<Arc<dyn DynHandler>> {
        self.handlers
            .get(function.as_str())
            .or_else(|| self.handlers.get(function.short_name()))
            .cloned()
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
