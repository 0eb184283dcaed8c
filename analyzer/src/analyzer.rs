use core::future::Future;
use std::sync::Arc;

use anyhow::Result;
use chain_api::{ChainApi, ResilientFetcher, RetryPolicy};
use database::Sink;
use logging::{error_with_progress, info_with_progress};
use state_cache::StateCache;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    config::AnalyzerConfig, downloader::Downloader, orchestrator::EpochOrchestrator,
    worker_pool::WorkerPool,
};

/// The whole pipeline: downloader, epoch orchestrator and validator workers.
pub struct ChainAnalyzer<A> {
    config: Arc<AnalyzerConfig>,
    api: A,
    sink: Arc<dyn Sink>,
}

impl<A: ChainApi + 'static> ChainAnalyzer<A> {
    pub fn new(config: AnalyzerConfig, api: A, sink: Arc<dyn Sink>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
            api,
            sink,
        })
    }

    /// Runs until the configured range is processed or `token` is cancelled.
    ///
    /// An error in any component cancels `token` and is returned once every component stopped.
    pub async fn run(self, token: CancellationToken) -> Result<()> {
        let Self { config, api, sink } = self;

        let policy = RetryPolicy {
            max_attempts: config.max_retries,
            timeout_backoff: config.retry_backoff,
        };

        let fetcher = Arc::new(ResilientFetcher::new(api, policy, token.clone()));
        let cache = Arc::new(StateCache::new(config.cache_lock_timeout));

        let (epoch_sender, epoch_receiver) = mpsc::channel(config.max_concurrent_epochs);
        let (val_sender, val_receiver) = async_channel::bounded(config.task_queue_capacity);

        let workers = WorkerPool::spawn(
            config.worker_count,
            val_receiver,
            Arc::clone(&sink),
            token.clone(),
        );

        let orchestrator = Arc::new(EpochOrchestrator::new(
            Arc::clone(&config),
            Arc::clone(&cache),
            Arc::clone(&sink),
            val_sender,
            token.clone(),
        ));

        let downloader = Downloader::new(
            Arc::clone(&config),
            fetcher,
            cache,
            sink,
            token.clone(),
        );

        info_with_progress!(
            "chain analyzer starting at epoch {} with {} workers",
            config.init_epoch(),
            config.worker_count,
        );

        let (downloaded, orchestrated, computed) = tokio::join!(
            cancel_on_error(&token, "downloader", downloader.run(epoch_sender)),
            cancel_on_error(&token, "epoch orchestrator", orchestrator.run(epoch_receiver)),
            cancel_on_error(&token, "validator workers", workers.join()),
        );

        downloaded.and(orchestrated).and(computed)?;

        info_with_progress!("chain analyzer stopped");

        Ok(())
    }
}

async fn cancel_on_error(
    token: &CancellationToken,
    component: &str,
    future: impl Future<Output = Result<()>>,
) -> Result<()> {
    let result = future.await;

    if let Err(error) = &result {
        error_with_progress!("{component} failed: {error:?}");
        token.cancel();
    }

    result
}
