//! The agent's scheduler loop.
//!
//! One Tokio task wakes on a fixed tick, runs whichever tasks are due in a
//! fixed order, and folds each task's outcome into its backoff state:
//! 1. `config-poll`: fetches task cadence from the [`ConfigPoller`]
//! 2. `code-base`: rescans and publishes the code base when its fingerprint changed
//! 3. `invocation-data`: flushes the invocation registry
//! 4. `upload`: hands pending files to the [`Uploader`], when there is one
//!
//! Until the first successful poll only the poll task runs. On shutdown the
//! loop exits between ticks and flushes the registry one last time.

use std::{sync::Arc, time::Duration};

use arc_swap::ArcSwapOption;
use tally_core::{
    AppIdentity, CodeBase, CodeBaseModel, FlushTarget, InvocationRegistry, MethodFilter,
    Normalizer, Payload, Publication, PublicationHeader, ScanScope, SignatureResolver, now_millis,
    publication::ALL_PATTERN,
};
use tally_exchange::{ConsumedFile, ExchangeDir};
use tokio::{
    sync::broadcast,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{
    adapters::{ConfigPoller, Uploader},
    config::{AgentConfig, DynamicConfig, TaskSettings},
    error::AgentError,
    scheduler::{TaskKind, TaskState},
};

/// Counters reported when the daemon stops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentStats {
    pub ticks: u64,
    pub polls: u64,
    pub code_base_publications: u64,
    pub invocation_publications: u64,
    pub uploaded_files: u64,
}

/// Everything the daemon needs besides its own scheduling state.
pub struct DaemonContext {
    pub config: AgentConfig,
    pub app: AppIdentity,
    pub registry: Arc<InvocationRegistry>,
    pub model: Arc<ArcSwapOption<CodeBaseModel>>,
    pub exchange: ExchangeDir,
    pub poller: Arc<dyn ConfigPoller>,
    pub uploader: Option<Arc<dyn Uploader>>,
}

pub struct AgentDaemon {
    ctx: DaemonContext,
    normalizer: Normalizer,
    shutdown_rx: broadcast::Receiver<()>,
    /// Last successfully polled cadence; `None` until the first poll.
    dynamic: Option<DynamicConfig>,
    poll: TaskState,
    code_base: TaskState,
    invocations: TaskState,
    upload: TaskState,
    code_base_sequence: u64,
    invocation_sequence: u64,
    stats: AgentStats,
}

impl AgentDaemon {
    pub fn new(ctx: DaemonContext, shutdown_rx: broadcast::Receiver<()>) -> Self {
        let initial = ctx.config.initial.clone();
        Self {
            ctx,
            normalizer: Normalizer::new(),
            shutdown_rx,
            dynamic: None,
            poll: TaskState::new(TaskKind::ConfigPoll, &initial.config_poll),
            code_base: TaskState::new(TaskKind::CodeBase, &initial.code_base),
            invocations: TaskState::new(TaskKind::InvocationData, &initial.invocation_data),
            upload: TaskState::new(TaskKind::Upload, &initial.upload),
            code_base_sequence: 1,
            invocation_sequence: 1,
            stats: AgentStats::default(),
        }
    }

    /// Runs until a shutdown signal arrives (or every sender is dropped),
    /// then performs the final flush.
    pub async fn run(mut self) -> Result<AgentStats, AgentError> {
        info!(
            app = %self.ctx.app.app_name,
            exchange = %self.ctx.exchange.dir().display(),
            "agent started"
        );
        let mut ticker = tokio::time::interval(self.ctx.config.tick_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = self.shutdown_rx.recv() => {
                    info!("shutdown requested");
                    break;
                }
            }
        }

        self.final_flush();
        info!(
            ticks = self.stats.ticks,
            code_base_publications = self.stats.code_base_publications,
            invocation_publications = self.stats.invocation_publications,
            "agent stopped"
        );
        Ok(self.stats)
    }

    /// One pass over the tasks; each due task runs at most once.
    pub async fn tick(&mut self) {
        self.stats.ticks += 1;

        if self.poll.is_due(Instant::now()) {
            let result = self.poll_config().await;
            settle(&mut self.poll, result);
        }
        let Some(dynamic) = self.dynamic.clone() else {
            return;
        };

        if self.code_base.is_due(Instant::now()) {
            if dynamic.code_base.enabled {
                let result = self.publish_code_base();
                settle(&mut self.code_base, result);
            } else {
                skip(&mut self.code_base);
            }
        }
        if self.invocations.is_due(Instant::now()) {
            if dynamic.invocation_data.enabled {
                let result = self.publish_invocations();
                settle(&mut self.invocations, result);
            } else {
                skip(&mut self.invocations);
            }
        }
        if self.ctx.uploader.is_some() && self.upload.is_due(Instant::now()) {
            if dynamic.upload.enabled {
                let result = self.upload_pending().await;
                settle(&mut self.upload, result);
            } else {
                skip(&mut self.upload);
            }
        }
    }

    async fn poll_config(&mut self) -> Result<(), AgentError> {
        let polled = self.ctx.poller.poll().await.map_err(AgentError::Poll)?;
        self.stats.polls += 1;
        let now = Instant::now();
        let first = self.dynamic.is_none();

        apply_cadence(&mut self.poll, &polled.config_poll, now);
        apply_cadence(&mut self.code_base, &polled.code_base, now);
        apply_cadence(&mut self.invocations, &polled.invocation_data, now);
        apply_cadence(&mut self.upload, &polled.upload, now);
        if first {
            // Initial scan and upload as soon as there is a cadence; the first
            // flush waits for a full recording interval.
            self.code_base.schedule_now();
            self.upload.schedule_now();
            self.invocations.schedule_next(now);
            info!(
                code_base_secs = polled.code_base.interval_secs,
                invocation_secs = polled.invocation_data.interval_secs,
                "received first configuration"
            );
        }
        self.dynamic = Some(polled);
        Ok(())
    }

    /// Scans and publishes the code base unless its fingerprint is unchanged
    /// since the last publication.
    fn publish_code_base(&mut self) -> Result<(), AgentError> {
        let config = &self.ctx.config;
        let code_base = CodeBase::new(config.code_base.clone(), &config.include)?;
        let fingerprint = code_base.fingerprint()?;
        let unchanged = self
            .ctx
            .model
            .load()
            .as_deref()
            .is_some_and(|m| m.fingerprint == fingerprint);
        if unchanged {
            debug!(files = fingerprint.count, "code base unchanged");
            return Ok(());
        }

        let scope = ScanScope::new(&config.packages, &config.exclude_packages)?;
        let filter = MethodFilter::parse(&config.method_visibility)
            .with_trivial_accessors(config.include_trivial_accessors);
        let model = SignatureResolver::new(scope, filter).scan(&code_base)?;
        let tracked = model.tracked.len();

        let now = now_millis();
        let publication = Publication {
            header: PublicationHeader {
                app: self.ctx.app.clone(),
                sequence: self.code_base_sequence,
                code_base_fingerprint: Some(model.fingerprint.content_hash()),
                recording_interval_started_at_millis: self.ctx.app.started_at_millis,
                published_at_millis: now,
            },
            payload: Payload::CodeBase(model),
        };
        let bytes = publication.encode()?;
        let path = self.ctx.exchange.publish(&bytes, &publication.file_prefix())?;
        info!(path = %path.display(), tracked, "published code base");
        if let Payload::CodeBase(model) = publication.payload {
            self.ctx.model.store(Some(Arc::new(model)));
        }
        self.code_base_sequence += 1;
        self.stats.code_base_publications += 1;
        Ok(())
    }

    fn publish_invocations(&mut self) -> Result<(), AgentError> {
        let model = self.ctx.model.load_full();
        let target = FlushTarget {
            exchange: &self.ctx.exchange,
            app: &self.ctx.app,
            model: model.as_deref(),
            normalizer: &self.normalizer,
        };
        let outcome = self
            .ctx
            .registry
            .flush_due(self.invocation_sequence, &target)?;
        if let Some(path) = &outcome.file {
            info!(
                path = %path.display(),
                signatures = outcome.published,
                unknown = outcome.unknown,
                dropped = outcome.dropped,
                "published invocation data"
            );
            self.invocation_sequence += 1;
            self.stats.invocation_publications += 1;
        } else {
            debug!(recorded = outcome.recorded, "no invocation data to publish");
        }
        Ok(())
    }

    /// Uploads every pending file. Any failure after files were consumed puts
    /// the ones not yet discarded back to pending and fails the task. Files a
    /// previous run could not return are picked up again first.
    async fn upload_pending(&mut self) -> Result<(), AgentError> {
        let Some(uploader) = self.ctx.uploader.clone() else {
            return Ok(());
        };
        let leftover = self.ctx.exchange.reset_consumed_on_startup(ALL_PATTERN)?;
        if leftover > 0 {
            warn!(leftover, "returned files left consumed by a failed upload");
        }
        let files = self.ctx.exchange.consume_all(ALL_PATTERN)?;
        let result = self.upload_files(uploader.as_ref(), &files).await;
        if result.is_err() {
            match self.ctx.exchange.reset_consumed_on_startup(ALL_PATTERN) {
                Ok(reset) => debug!(reset, "returned files to pending after failed upload"),
                Err(err) => error!(
                    error = %err,
                    "cannot return files to pending; next upload retries"
                ),
            }
        }
        result
    }

    async fn upload_files(
        &mut self,
        uploader: &dyn Uploader,
        files: &[ConsumedFile],
    ) -> Result<(), AgentError> {
        for file in files {
            uploader
                .upload(&file.stem, &file.bytes)
                .await
                .map_err(|error| AgentError::Upload {
                    name: file.stem.clone(),
                    error,
                })?;
            self.ctx.exchange.discard(file)?;
            self.stats.uploaded_files += 1;
            debug!(file = %file.stem, uploader = uploader.name(), "uploaded");
        }
        Ok(())
    }

    /// Publishes whatever the registry holds, whether or not a configuration
    /// was ever received.
    fn final_flush(&mut self) {
        self.invocations.schedule_now();
        if let Err(err) = self.publish_invocations() {
            error!(error = %err, "final invocation flush failed; last interval is lost");
        }
    }
}

fn apply_cadence(task: &mut TaskState, settings: &TaskSettings, now: Instant) {
    if task.differs_from(settings) {
        debug!(task = %task.kind(), interval_secs = settings.interval_secs, "cadence changed");
        task.update_intervals(settings, now);
    }
}

/// Folds a task outcome into its schedule.
fn settle(task: &mut TaskState, result: Result<(), AgentError>) {
    let now = Instant::now();
    let err = match result {
        Ok(()) => return task.schedule_next(now),
        Err(err) => err,
    };
    let delay: Duration = task.schedule_retry(now);
    let retry_in_ms = delay.as_millis() as u64;
    match err {
        AgentError::Exchange(_) | AgentError::Flush(_) | AgentError::Io { .. } => error!(
            task = %task.kind(),
            failures = task.failures(),
            retry_in_ms,
            error = %err,
            "task failed"
        ),
        _ => warn!(
            task = %task.kind(),
            failures = task.failures(),
            retry_in_ms,
            error = %err,
            "task failed"
        ),
    }
}

/// A disabled task does nothing and waits its regular interval.
fn skip(task: &mut TaskState) {
    debug!(task = %task.kind(), "task disabled");
    task.schedule_next(Instant::now());
}
