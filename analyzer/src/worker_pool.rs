use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_channel::Receiver;
use database::{RecordBatch, Sink};
use epoch_metrics::StateMetrics as _;
use logging::{debug_with_progress, error_with_progress, warn_with_progress};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::tasks::ValTask;

/// Fixed number of workers draining the validator task queue.
///
/// Workers exit once the queue is closed and empty, or as soon as the token is cancelled.
/// A batch that was already dequeued is always finished.
pub struct WorkerPool {
    workers: JoinSet<Result<()>>,
}

impl WorkerPool {
    #[must_use]
    pub fn spawn(
        worker_count: usize,
        tasks: Receiver<ValTask>,
        sink: Arc<dyn Sink>,
        token: CancellationToken,
    ) -> Self {
        let mut workers = JoinSet::new();

        for worker_id in 0..worker_count.max(1) {
            let worker = Worker {
                id: worker_id,
                tasks: tasks.clone(),
                sink: Arc::clone(&sink),
                token: token.clone(),
            };

            workers.spawn(worker.run());
        }

        Self { workers }
    }

    /// Waits for every worker and returns the first error any of them hit.
    pub async fn join(mut self) -> Result<()> {
        let mut outcome = Ok(());

        while let Some(result) = self.workers.join_next().await {
            let result = result.context("validator worker panicked").and_then(|result| result);

            if outcome.is_ok() {
                outcome = result;
            }
        }

        outcome
    }
}

struct Worker {
    id: usize,
    tasks: Receiver<ValTask>,
    sink: Arc<dyn Sink>,
    token: CancellationToken,
}

impl Worker {
    async fn run(self) -> Result<()> {
        loop {
            let task = tokio::select! {
                biased;

                () = self.token.cancelled() => {
                    let abandoned = self.tasks.len();

                    if abandoned > 0 {
                        warn_with_progress!(
                            "validator worker {} stopping, {abandoned} queued tasks abandoned",
                            self.id,
                        );
                    }

                    return Ok(());
                }
                task = self.tasks.recv() => match task {
                    Ok(task) => task,
                    // The queue is closed and drained.
                    Err(_) => return Ok(()),
                },
            };

            if let Err(error) = process(task, self.sink.as_ref()).await {
                error_with_progress!("validator worker {} failed: {error:?}", self.id);
                self.token.cancel();
                return Err(error);
            }
        }
    }
}

async fn process(task: ValTask, sink: &dyn Sink) -> Result<()> {
    let ValTask { bundle, batch } = task;
    let epoch = bundle.base().epoch;

    let rewards = batch
        .indices
        .iter()
        .filter_map(|validator_index| {
            bundle
                .validator_rewards(*validator_index)
                .map_err(|error| {
                    warn_with_progress!(
                        "skipping rewards of validator {validator_index} in epoch {epoch}: {error}",
                    );
                })
                .ok()
        })
        .collect::<Vec<_>>();

    if rewards.is_empty() {
        return Ok(());
    }

    debug_with_progress!(
        "persisting rewards of {} validators of pool {} in epoch {epoch}",
        rewards.len(),
        batch.pool,
    );

    sink.persist(RecordBatch::ValidatorRewards(rewards))
        .await
        .with_context(|| {
            format!(
                "failed to persist validator rewards of pool {} in epoch {epoch}",
                batch.pool,
            )
        })
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use database::InMemorySink;
    use epoch_metrics::MetricsBundle;
    use factory::FailingSink;
    use types::nonstandard::Phase;

    use super::*;
    use crate::partitioner::{Batch, ALL_POOL};

    const VALIDATOR_COUNT: usize = 12;

    fn bundle(epoch: u64) -> Result<Arc<MetricsBundle>> {
        let prev = Arc::new(factory::state(Phase::Altair, epoch - 2, VALIDATOR_COUNT)?);
        let current = Arc::new(factory::state(Phase::Altair, epoch - 1, VALIDATOR_COUNT)?);
        let next = Arc::new(factory::state(Phase::Altair, epoch, VALIDATOR_COUNT)?);

        Ok(Arc::new(MetricsBundle::build(epoch, next, current, prev)?))
    }

    fn task(bundle: &Arc<MetricsBundle>, indices: Vec<u64>) -> ValTask {
        ValTask {
            bundle: Arc::clone(bundle),
            batch: Batch {
                pool: ALL_POOL.into(),
                indices,
            },
        }
    }

    #[tokio::test]
    async fn test_workers_drain_closed_queue() -> Result<()> {
        let bundle = bundle(4)?;
        let sink = Arc::new(InMemorySink::default());
        let (sender, receiver) = async_channel::bounded(2);

        let pool = WorkerPool::spawn(
            3,
            receiver,
            Arc::clone(&sink) as Arc<dyn Sink>,
            CancellationToken::new(),
        );

        for indices in [vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9, 10, 11]] {
            sender.send(task(&bundle, indices)).await?;
        }

        sender.close();
        pool.join().await?;

        let tables = sink.snapshot();

        assert_eq!(tables.validator_rewards.len(), VALIDATOR_COUNT);
        assert_eq!(tables.persist_calls, 3);
        assert!(tables.validator_rewards.keys().all(|(epoch, _)| *epoch == 4));

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_validators_are_skipped() -> Result<()> {
        let bundle = bundle(4)?;
        let sink = Arc::new(InMemorySink::default());
        let (sender, receiver) = async_channel::bounded(1);

        let pool = WorkerPool::spawn(
            1,
            receiver,
            Arc::clone(&sink) as Arc<dyn Sink>,
            CancellationToken::new(),
        );

        sender.send(task(&bundle, vec![10, 11, 12, 400])).await?;
        sender.close();
        pool.join().await?;

        let indices = sink
            .snapshot()
            .validator_rewards
            .keys()
            .map(|(_, validator_index)| *validator_index)
            .collect::<Vec<_>>();

        assert_eq!(indices, [10, 11]);

        Ok(())
    }

    #[tokio::test]
    async fn test_persistence_failure_cancels_pipeline() -> Result<()> {
        let bundle = bundle(4)?;
        let sink = Arc::new(FailingSink::new("validator_rewards"));
        let token = CancellationToken::new();
        let (sender, receiver) = async_channel::bounded(4);

        let pool = WorkerPool::spawn(2, receiver, sink, token.clone());

        sender.send(task(&bundle, vec![0, 1])).await?;

        assert!(pool.join().await.is_err());
        assert!(token.is_cancelled());

        Ok(())
    }

    #[tokio::test]
    async fn test_cancelled_workers_stop_without_draining() -> Result<()> {
        let bundle = bundle(4)?;
        let sink = Arc::new(InMemorySink::default());
        let token = CancellationToken::new();
        let (sender, receiver) = async_channel::bounded(4);

        for indices in [vec![0], vec![1], vec![2]] {
            sender.send(task(&bundle, indices)).await?;
        }

        token.cancel();

        WorkerPool::spawn(2, receiver.clone(), Arc::clone(&sink) as Arc<dyn Sink>, token)
            .join()
            .await?;

        assert_eq!(receiver.len(), 3);
        assert!(sink.snapshot().validator_rewards.is_empty());

        Ok(())
    }
}
