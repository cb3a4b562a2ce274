use std::{sync::Arc, time::Duration};

use arc_swap::ArcSwapOption;
use tally_core::{
    AppIdentity, CodeBaseModel, InvocationRegistry, Recorder, publication::ALL_PATTERN,
};
use tally_exchange::ExchangeDir;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::info;

use crate::{
    adapters::{ConfigPoller, StaticConfigPoller, Uploader},
    config::AgentConfig,
    error::AgentError,
    modes::daemon::{AgentDaemon, AgentStats, DaemonContext},
};

/// A configured, not yet started agent.
///
/// The registry exists from construction on, so instrumentation can be wired
/// to [`Agent::recorder`] before [`Agent::start`].
pub struct Agent {
    config: AgentConfig,
    registry: Arc<InvocationRegistry>,
    poller: Arc<dyn ConfigPoller>,
    uploader: Option<Arc<dyn Uploader>>,
}

impl Agent {
    /// Without a poller the agent serves itself `config.initial`.
    pub fn new(config: AgentConfig) -> Result<Self, AgentError> {
        config.validate()?;
        let poller = Arc::new(StaticConfigPoller::new(config.initial.clone()));
        Ok(Self {
            config,
            registry: Arc::new(InvocationRegistry::new()),
            poller,
            uploader: None,
        })
    }

    pub fn with_poller(mut self, poller: impl ConfigPoller + 'static) -> Self {
        self.poller = Arc::new(poller);
        self
    }

    pub fn with_uploader(mut self, uploader: impl Uploader + 'static) -> Self {
        self.uploader = Some(Arc::new(uploader));
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn recorder(&self) -> Recorder {
        Recorder::new(Arc::clone(&self.registry))
    }

    /// Opens the exchange directory, returns files left consumed by a previous
    /// run to pending, and spawns the scheduler loop. Must be called from
    /// within a Tokio runtime.
    pub fn start(self) -> Result<AgentHandle, AgentError> {
        let exchange = ExchangeDir::open(&self.config.exchange_dir)?;
        let reset = exchange.reset_consumed_on_startup(ALL_PATTERN)?;
        if reset > 0 {
            info!(reset, "returned unconfirmed files to pending");
        }

        let app = AppIdentity::new(
            self.config.app_name.clone(),
            self.config.app_version.clone(),
            self.config.environment.clone(),
        );
        let model = Arc::new(ArcSwapOption::empty());
        let shutdown_timeout = self.config.shutdown_timeout();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let recorder = self.recorder();

        let daemon = AgentDaemon::new(
            DaemonContext {
                config: self.config,
                app,
                registry: self.registry,
                model: Arc::clone(&model),
                exchange,
                poller: self.poller,
                uploader: self.uploader,
            },
            shutdown_rx,
        );
        let join = tokio::spawn(daemon.run());

        Ok(AgentHandle {
            recorder,
            model,
            shutdown_tx,
            shutdown_timeout,
            join,
        })
    }
}

/// Handle to a running agent.
pub struct AgentHandle {
    recorder: Recorder,
    model: Arc<ArcSwapOption<CodeBaseModel>>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_timeout: Duration,
    join: JoinHandle<Result<AgentStats, AgentError>>,
}

impl AgentHandle {
    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }

    /// The most recently published code-base model, if any.
    pub fn model(&self) -> Option<Arc<CodeBaseModel>> {
        self.model.load_full()
    }

    /// Stops ticking, performs the final flush and waits for the loop to
    /// exit, at most the configured shutdown timeout.
    pub async fn shutdown(self) -> Result<AgentStats, AgentError> {
        // A send error means the loop is already gone; the join below reports why.
        let _ = self.shutdown_tx.send(());
        match tokio::time::timeout(self.shutdown_timeout, self.join).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(AgentError::Join(join.to_string())),
            Err(_) => Err(AgentError::ShutdownTimeout(self.shutdown_timeout)),
        }
    }
}
