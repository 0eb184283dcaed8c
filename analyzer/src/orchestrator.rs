use std::{collections::BTreeSet, sync::Arc};

use acquire_book::{AcquireBook, Acquisition};
use anyhow::{anyhow, bail, Context as _, Result};
use async_channel::Sender;
use database::{RecordBatch, Selector, Sink};
use epoch_metrics::{MetricsBase, MetricsBundle, StateMetrics as _};
use itertools::Itertools as _;
use logging::{debug_with_progress, error_with_progress, info_with_progress, PROGRESS};
use state_cache::StateCache;
use strum::{AsRefStr, Display};
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinSet},
};
use tokio_util::sync::CancellationToken;
use types::{primitives::Epoch, state::AgnosticState};

use crate::{
    config::AnalyzerConfig,
    partitioner::ValidatorPartitioner,
    tasks::{EpochTask, ValTask},
};

#[derive(Clone, Copy, PartialEq, Eq, Debug, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EpochStage {
    Idle,
    AwaitingStates,
    BundleReady,
    DutiesPhase,
    StatusPhase,
    PoolPhase,
    EpochPhase,
    RewardsPhase,
    Done,
}

impl EpochStage {
    #[must_use]
    pub const fn is_phase(self) -> bool {
        matches!(
            self,
            Self::DutiesPhase
                | Self::StatusPhase
                | Self::PoolPhase
                | Self::EpochPhase
                | Self::RewardsPhase,
        )
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum EpochOutcome {
    #[default]
    Completed,
    /// Epoch metrics are turned off.
    Disabled,
    /// Another orchestration of the same epoch was in flight.
    Duplicate,
    /// The epoch could not be analyzed. The reason has been logged.
    Aborted,
    Cancelled,
}

/// Stages one orchestration went through.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EpochReport {
    pub epoch: Epoch,
    pub outcome: EpochOutcome,
    pub stages: Vec<EpochStage>,
}

impl EpochReport {
    fn new(epoch: Epoch) -> Self {
        Self {
            epoch,
            outcome: EpochOutcome::default(),
            stages: vec![EpochStage::Idle],
        }
    }

    #[must_use]
    pub fn stage(&self) -> EpochStage {
        self.stages.last().copied().unwrap_or(EpochStage::Idle)
    }

    #[must_use]
    pub fn phases(&self) -> Vec<EpochStage> {
        self.stages
            .iter()
            .copied()
            .filter(|stage| stage.is_phase())
            .collect()
    }

    fn enter(&mut self, stage: EpochStage) {
        self.stages.push(stage);
    }

    fn stop(&mut self, outcome: EpochOutcome) {
        self.outcome = outcome;
    }
}

/// Turns cached end-of-epoch states into records.
///
/// Epoch `E` is analyzed from the states of epochs `E - 2`, `E - 1` and `E`.
/// States below the initial epoch are never downloaded and are replaced with empty ones,
/// which disables the phases that need them.
pub struct EpochOrchestrator {
    config: Arc<AnalyzerConfig>,
    cache: Arc<StateCache>,
    book: Arc<AcquireBook<()>>,
    partitioner: ValidatorPartitioner,
    sink: Arc<dyn Sink>,
    val_tasks: Sender<ValTask>,
    token: CancellationToken,
}

impl EpochOrchestrator {
    #[must_use]
    pub fn new(
        config: Arc<AnalyzerConfig>,
        cache: Arc<StateCache>,
        sink: Arc<dyn Sink>,
        val_tasks: Sender<ValTask>,
        token: CancellationToken,
    ) -> Self {
        let partitioner = ValidatorPartitioner::new(config.pools.clone(), config.worker_count);

        Self {
            config,
            cache,
            book: Arc::new(AcquireBook::new("epoch")),
            partitioner,
            sink,
            val_tasks,
            token,
        }
    }

    #[must_use]
    pub fn book(&self) -> &AcquireBook<()> {
        &self.book
    }

    /// Processes epochs as they arrive until the queue is closed or the token is cancelled.
    ///
    /// Returns only after every epoch in flight has finished and the epoch book is empty.
    /// The validator task queue is closed last so workers can drain it.
    pub async fn run(self: Arc<Self>, mut epochs: mpsc::Receiver<EpochTask>) -> Result<()> {
        let result = self.schedule(&mut epochs).await;

        self.book.wait_until_empty().await?;
        self.val_tasks.close();

        debug_with_progress!("epoch orchestrator stopped");

        result
    }

    pub async fn process_epoch(&self, epoch: Epoch) -> Result<EpochReport> {
        let mut report = EpochReport::new(epoch);

        if !self.config.metrics.epoch {
            report.stop(EpochOutcome::Disabled);
            return Ok(report);
        }

        let page = match self.book.acquire(format!("epoch={epoch}")).await {
            Acquisition::Holder(page) => page,
            Acquisition::Follower(()) => {
                debug_with_progress!("epoch {epoch} was processed concurrently, skipping");
                report.stop(EpochOutcome::Duplicate);
                return Ok(report);
            }
        };

        let result = self.run_stages(epoch, &mut report).await;

        page.publish(());

        result?;

        if report.outcome == EpochOutcome::Completed {
            report.enter(EpochStage::Done);
            PROGRESS.record_processed(epoch);

            info_with_progress!(
                "epoch {epoch} processed, phases: [{}]",
                report.phases().iter().join(", "),
            );
        }

        Ok(report)
    }

    async fn schedule(self: &Arc<Self>, epochs: &mut mpsc::Receiver<EpochTask>) -> Result<()> {
        let mut in_flight = JoinSet::new();
        let mut active = BTreeSet::new();
        let mut unscheduled = self.config.init_epoch();

        loop {
            if in_flight.len() >= self.config.max_concurrent_epochs {
                if let Some(joined) = in_flight.join_next().await {
                    self.finish(joined, &mut active, unscheduled)?;
                }

                continue;
            }

            let task = tokio::select! {
                biased;

                () = self.token.cancelled() => break,
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    self.finish(joined, &mut active, unscheduled)?;
                    continue;
                }
                task = epochs.recv() => task,
            };

            let Some(EpochTask { epoch }) = task else {
                break;
            };

            active.insert(epoch);
            unscheduled = unscheduled.max(epoch + 1);

            let orchestrator = Arc::clone(self);

            in_flight.spawn(async move { (epoch, orchestrator.process_epoch(epoch).await) });
        }

        while let Some(joined) = in_flight.join_next().await {
            self.finish(joined, &mut active, unscheduled)?;
        }

        Ok(())
    }

    fn finish(
        &self,
        joined: Result<(Epoch, Result<EpochReport>), JoinError>,
        active: &mut BTreeSet<Epoch>,
        unscheduled: Epoch,
    ) -> Result<()> {
        let (epoch, result) = joined.context("epoch orchestration panicked")?;

        active.remove(&epoch);

        result.with_context(|| format!("failed to process epoch {epoch}"))?;

        let lowest_needed = active.first().copied().unwrap_or(unscheduled);
        let pruned = self.cache.prune(lowest_needed.saturating_sub(2))?;

        if pruned > 0 {
            debug_with_progress!(
                "pruned {pruned} states below epoch {}",
                lowest_needed.saturating_sub(2),
            );
        }

        Ok(())
    }

    async fn run_stages(&self, epoch: Epoch, report: &mut EpochReport) -> Result<()> {
        report.enter(EpochStage::AwaitingStates);

        let init_epoch = self.config.init_epoch();
        let tracked = |offset| epoch.checked_sub(offset).filter(|epoch| *epoch >= init_epoch);

        let mut states = Vec::with_capacity(3);

        for tracked_epoch in [tracked(2), tracked(1), Some(epoch)] {
            let state = match tracked_epoch {
                Some(tracked_epoch) => match self.wait_state(tracked_epoch).await {
                    Ok(Some(state)) => state,
                    Ok(None) => {
                        report.stop(EpochOutcome::Cancelled);
                        return Ok(());
                    }
                    Err(error) => {
                        error_with_progress!(
                            "could not obtain states for epoch {epoch}: {error:?}",
                        );
                        report.stop(EpochOutcome::Aborted);
                        return Ok(());
                    }
                },
                None => Arc::new(AgnosticState::empty()),
            };

            states.push(state);
        }

        let [prev, current, next] = <[_; 3]>::try_from(states)
            .map_err(|_| anyhow!("expected three states for epoch {epoch}"))?;

        report.enter(EpochStage::BundleReady);

        let bundle = match MetricsBundle::build(epoch, next, current, prev) {
            Ok(bundle) => Arc::new(bundle),
            Err(error) => {
                error_with_progress!("could not build metrics bundle for epoch {epoch}: {error}");
                report.stop(EpochOutcome::Aborted);
                return Ok(());
            }
        };

        let base = bundle.base();

        report.enter(EpochStage::DutiesPhase);
        self.persist_duties(base).await?;

        if self.config.is_finalized_mode() {
            report.enter(EpochStage::StatusPhase);
            self.persist_statuses(base).await?;
        } else {
            debug_with_progress!(
                "epoch {epoch}: validator statuses are only tracked for finalized states",
            );
        }

        if !base.has_current() {
            debug_with_progress!(
                "epoch {epoch}: no state for epoch {}, skipping the remaining phases",
                epoch.saturating_sub(1),
            );
            return Ok(());
        }

        report.enter(EpochStage::PoolPhase);
        self.persist_pools(base).await?;

        report.enter(EpochStage::EpochPhase);
        self.persist(epoch, RecordBatch::EpochSummaries(vec![base.epoch_summary()]))
            .await?;

        if !base.has_prev() {
            debug_with_progress!(
                "epoch {epoch}: no state for epoch {}, skipping rewards",
                epoch.saturating_sub(2),
            );
            return Ok(());
        }

        if !self.config.metrics.validator_rewards {
            debug_with_progress!("epoch {epoch}: validator rewards are disabled");
            return Ok(());
        }

        report.enter(EpochStage::RewardsPhase);

        if !self.dispatch_rewards(&bundle).await? {
            report.stop(EpochOutcome::Cancelled);
        }

        Ok(())
    }

    async fn wait_state(&self, epoch: Epoch) -> Result<Option<Arc<AgnosticState>>> {
        tokio::select! {
            biased;

            () = self.token.cancelled() => Ok(None),
            state = self.cache.wait(epoch) => state.map(Some),
        }
    }

    async fn persist_duties(&self, base: &MetricsBase) -> Result<()> {
        let carried = base.carried_missed_block();

        let mut duties = base.next_proposer_duties();
        duties.extend(base.current_proposer_duties(carried));

        self.persist(base.epoch, RecordBatch::ProposerDuties(duties))
            .await
    }

    async fn persist_statuses(&self, base: &MetricsBase) -> Result<()> {
        let epoch = base.next.epoch;

        self.sink
            .delete(Selector::ValidatorLastStatuses { epoch })
            .await
            .with_context(|| format!("failed to delete validator last statuses of epoch {epoch}"))?;

        let statuses = base.validator_last_statuses();

        self.persist(epoch, RecordBatch::ValidatorLastStatuses(statuses))
            .await
    }

    async fn persist_pools(&self, base: &MetricsBase) -> Result<()> {
        let summaries = self
            .partitioner
            .pools(base.next.validator_count())
            .iter()
            .map(|pool| base.pool_summary(&pool.pool, &pool.indices))
            .collect();

        self.persist(base.current.epoch, RecordBatch::PoolSummaries(summaries))
            .await
    }

    /// Returns `false` if cancelled before every batch was queued.
    async fn dispatch_rewards(&self, bundle: &Arc<MetricsBundle>) -> Result<bool> {
        let epoch = bundle.base().epoch;

        self.sink
            .delete(Selector::ValidatorRewards { epoch })
            .await
            .with_context(|| format!("failed to delete validator rewards of epoch {epoch}"))?;

        let batches = self
            .partitioner
            .partition(bundle.base().next.validator_count());

        debug_with_progress!("epoch {epoch}: dispatching {} reward batches", batches.len());

        for batch in batches {
            let task = ValTask {
                bundle: Arc::clone(bundle),
                batch,
            };

            tokio::select! {
                biased;

                () = self.token.cancelled() => return Ok(false),
                result = self.val_tasks.send(task) => {
                    if result.is_err() {
                        bail!("validator task queue closed while dispatching epoch {epoch}");
                    }
                }
            }
        }

        Ok(true)
    }

    async fn persist(&self, epoch: Epoch, batch: RecordBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let kind = batch.as_ref().to_owned();

        self.sink
            .persist(batch)
            .await
            .with_context(|| format!("failed to persist {kind} of epoch {epoch}"))
    }
}
