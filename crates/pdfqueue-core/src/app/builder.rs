//! QueueBuilder - queue のワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: 期待される function が未登録なら build() が失敗する
//! - store / clock / id 生成はすべて差し替え可能（テストでは FixedClock + InMemoryStore）

use std::sync::Arc;

use super::client::QueueClient;
use super::control::ControlApi;
use super::dispatcher::Dispatcher;
use super::status::{ArgsFormatter, StatusProjector};
use crate::config::QueueConfig;
use crate::impls::InMemoryStore;
use crate::ports::{Clock, IdGenerator, RecordStore, SystemClock, UlidGenerator};
use crate::queue::{BatchRepository, PassBudget, ProcessLock, QueueProcessor, RetryPolicy};
use crate::typed::{DynHandler, Function, FunctionRegistry, Handler, RegistryError};

/// # 使用例
/// ```ignore
/// let runtime = QueueBuilder::new()
///     .register::<CreatePdf, _>(Renderer::new())?
///     .expect_functions(&[CreatePdf::NAME])
///     .store(Arc::new(SledStore::open("data/queue")?))
///     .build()?;
/// ```
pub struct QueueBuilder {
    registry: FunctionRegistry,
    expected_functions: Option<Vec<String>>,
    config: QueueConfig,
    store: Option<Arc<dyn RecordStore>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    projector: StatusProjector,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing functions: {0:?}. These functions were expected but not registered.")]
    MissingFunctions(Vec<String>),
}

impl QueueBuilder {
    pub fn new() -> Self {
        Self {
            registry: FunctionRegistry::new(),
            expected_functions: None,
            config: QueueConfig::default(),
            store: None,
            clock: None,
            ids: None,
            projector: StatusProjector::default(),
        }
    }

    /// Handler を登録
    pub fn register<F: Function, H: Handler<F> + 'static>(mut self, handler: H) -> Result<Self, RegistryError> {
        self.registry.register::<F, H>(handler)?;
        Ok(self)
    }

    pub fn register_dyn(mut self, handler: Arc<dyn DynHandler>) -> Result<Self, RegistryError> {
        self.registry.register_dyn(handler)?;
        Ok(self)
    }

    /// build() 時に登録済みであるべき function 名
    pub fn expect_functions(mut self, names: &[&str]) -> Self {
        self.expected_functions = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// 未指定なら InMemoryStore
    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// status 表示用の引数 formatter を追加（同名は上書き）
    pub fn formatter(mut self, function: &str, formatter: impl ArgsFormatter + 'static) -> Self {
        self.projector = self.projector.with_formatter(function, formatter);
        self
    }

    /// status 表示で function 名の代わりに出す名前
    pub fn display_name(mut self, function: &str, name: &str) -> Self {
        self.projector = self.projector.with_display_name(function, name);
        self
    }

    /// 検証してから全コンポーネントを組み立て、dispatcher を起動する
    ///
    /// dispatcher は tokio task なので runtime の中で呼ぶこと。
    pub fn build(self) -> Result<QueueRuntime, BuildError> {
        if let Some(expected) = &self.expected_functions {
            let registered = self.registry.registered_names();
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !registered.contains(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingFunctions(missing));
            }
        }

        let config = self.config;
        let store = self.store.unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(clock.clone())));

        let repo = Arc::new(BatchRepository::new(store.clone(), clock.clone(), config.identifier.clone()));
        let lock = Arc::new(ProcessLock::new(
            store,
            clock.clone(),
            &config.identifier,
            config.lock_staleness,
        ));
        let processor = Arc::new(QueueProcessor::new(
            repo.clone(),
            lock.clone(),
            Arc::new(self.registry),
            clock,
            RetryPolicy::new(config.max_retries),
            PassBudget::from_config(&config),
        ));
        let dispatcher = Arc::new(Dispatcher::spawn(processor.clone(), config.healthcheck_interval));

        let control = Arc::new(ControlApi::new(
            repo.clone(),
            lock,
            processor,
            dispatcher.clone(),
            Arc::new(self.projector),
        ));
        let client = Arc::new(QueueClient::new(repo, ids, dispatcher.clone()));

        Ok(QueueRuntime {
            config,
            control,
            client,
            dispatcher,
        })
    }
}

impl Default for QueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 組み立て済みの queue
pub struct QueueRuntime {
    config: QueueConfig,
    control: Arc<ControlApi>,
    client: Arc<QueueClient>,
    dispatcher: Arc<Dispatcher>,
}

impl QueueRuntime {
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn control(&self) -> Arc<ControlApi> {
        self.control.clone()
    }

    pub fn client(&self) -> Arc<QueueClient> {
        self.client.clone()
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    /// Stop the dispatcher after its current pass.
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::NewTask;
    use crate::domain::TaskExecutionError;
    use crate::typed::{CleanupPdfs, CreatePdf, SendNotification};
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct Noop;

    #[async_trait]
    impl Handler<CreatePdf> for Noop {
        async fn handle(&self, _call: CreatePdf) -> Result<(), TaskExecutionError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn build_success() {
        let runtime = QueueBuilder::new()
            .register::<CreatePdf, _>(Noop)
            .unwrap()
            .expect_functions(&[CreatePdf::NAME])
            .build()
            .unwrap();
        assert_eq!(runtime.config().identifier, "pdf_queue");
        runtime.shutdown().await;
    }

    #[test]
    fn build_missing_functions() {
        // fails before anything is spawned, so no runtime is needed
        let built = QueueBuilder::new()
            .register::<CreatePdf, _>(Noop)
            .unwrap()
            .expect_functions(&[CreatePdf::NAME, SendNotification::NAME, CleanupPdfs::NAME])
            .build();
        assert!(matches!(
            built,
            Err(BuildError::MissingFunctions(missing))
                if missing == vec![SendNotification::NAME.to_string(), CleanupPdfs::NAME.to_string()]
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let result = QueueBuilder::new()
            .register::<CreatePdf, _>(Noop)
            .unwrap()
            .register::<CreatePdf, _>(Noop);
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(name)) if name == "create_pdf"));
    }

    #[tokio::test]
    async fn runtime_processes_enqueued_work_end_to_end() {
        let runtime = QueueBuilder::new()
            .register::<CreatePdf, _>(Noop)
            .unwrap()
            .formatter("create_pdf", |args: &[Value]| vec![format!("#{}", args[0])])
            .display_name("create_pdf", "Generate PDF")
            .build()
            .unwrap();

        let client = runtime.client();
        client
            .save(vec![vec![NewTask::raw("create_pdf", vec![json!(4), json!("p")])]])
            .await
            .unwrap();
        let status = runtime.control().list_status().await.unwrap();
        assert_eq!(status.queue[0][0].queue, "Generate PDF (#4)");

        runtime.dispatcher().dispatch_and_wait().await.unwrap();
        assert!(runtime.control().list_status().await.unwrap().queue.is_empty());
        runtime.shutdown().await;
    }
}
