use std::sync::Arc;

use anyhow::{Context as _, Result};
use chain_api::{ChainApi, FetchError, ResilientFetcher};
use database::{RecordBatch, Sink};
use helper_functions::misc;
use logging::{debug_with_progress, info_with_progress, PROGRESS};
use state_cache::StateCache;
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinSet},
};
use tokio_util::sync::CancellationToken;
use types::{primitives::Epoch, records::FinalizedCheckpoint};

use crate::{config::AnalyzerConfig, tasks::EpochTask};

/// Downloads end-of-epoch states into the cache and schedules their epochs in increasing order.
///
/// The range starts at the initial epoch and ends at `final_slot` or at the last finalized epoch.
/// When following finality the range keeps growing until the token is cancelled.
pub struct Downloader<A> {
    config: Arc<AnalyzerConfig>,
    fetcher: Arc<ResilientFetcher<A>>,
    cache: Arc<StateCache>,
    sink: Arc<dyn Sink>,
    token: CancellationToken,
}

impl<A: ChainApi + 'static> Downloader<A> {
    #[must_use]
    pub const fn new(
        config: Arc<AnalyzerConfig>,
        fetcher: Arc<ResilientFetcher<A>>,
        cache: Arc<StateCache>,
        sink: Arc<dyn Sink>,
        token: CancellationToken,
    ) -> Self {
        Self {
            config,
            fetcher,
            cache,
            sink,
            token,
        }
    }

    /// Returns once every scheduled download has finished.
    /// The epoch queue is closed when `epochs` is dropped on return.
    pub async fn run(self, epochs: mpsc::Sender<EpochTask>) -> Result<()> {
        let mut downloads = JoinSet::new();

        self.download(&epochs, &mut downloads).await?;

        while let Some(joined) = downloads.join_next().await {
            finish(joined)?;
        }

        debug_with_progress!("downloader stopped");

        Ok(())
    }

    async fn download(
        &self,
        epochs: &mpsc::Sender<EpochTask>,
        downloads: &mut JoinSet<Result<()>>,
    ) -> Result<()> {
        let mut next_epoch = self.config.init_epoch();
        let mut finalized = None;

        let mut last_epoch = match self.config.final_slot {
            Some(final_slot) => {
                misc::compute_epoch_at_slot(final_slot.saturating_add(1)).checked_sub(1)
            }
            None => match self.refresh_finality(&mut finalized).await? {
                Some(checkpoint) => checkpoint.epoch.checked_sub(1),
                None => return Ok(()),
            },
        };

        info_with_progress!(
            "downloading states from epoch {next_epoch} to epoch {}",
            last_epoch.map_or_else(|| "none".to_owned(), |epoch| epoch.to_string()),
        );

        loop {
            while last_epoch.is_some_and(|last_epoch| next_epoch <= last_epoch) {
                while downloads.len() >= self.config.max_concurrent_requests {
                    if let Some(joined) = downloads.join_next().await {
                        finish(joined)?;
                    }
                }

                self.spawn_download(downloads, next_epoch);

                let scheduled = tokio::select! {
                    biased;

                    () = self.token.cancelled() => false,
                    result = epochs.send(EpochTask { epoch: next_epoch }) => result.is_ok(),
                };

                if !scheduled {
                    return Ok(());
                }

                next_epoch += 1;
            }

            if self.config.final_slot.is_some() || !self.config.follow_finality {
                return Ok(());
            }

            tokio::select! {
                biased;

                () = self.token.cancelled() => return Ok(()),
                Some(joined) = downloads.join_next(), if !downloads.is_empty() => {
                    finish(joined)?;
                    continue;
                }
                () = tokio::time::sleep(self.config.finality_poll_interval) => {}
            }

            match self.refresh_finality(&mut finalized).await? {
                Some(checkpoint) => last_epoch = last_epoch.max(checkpoint.epoch.checked_sub(1)),
                None => return Ok(()),
            }
        }
    }

    fn spawn_download(&self, downloads: &mut JoinSet<Result<()>>, epoch: Epoch) {
        let fetcher = Arc::clone(&self.fetcher);
        let cache = Arc::clone(&self.cache);

        downloads.spawn(async move {
            let slot = misc::compute_end_slot_at_epoch(epoch);

            let state = match fetcher.fetch_state(slot).await {
                Ok(state) => state,
                Err(FetchError::Cancelled { .. }) => return Ok(()),
                Err(error) => {
                    return Err(error).with_context(|| {
                        format!("failed to download state of epoch {epoch} at slot {slot}")
                    });
                }
            };

            if !cache.put(epoch, state)? {
                debug_with_progress!("state of epoch {epoch} is no longer needed");
            }

            PROGRESS.record_downloaded(epoch);

            Ok(())
        });
    }

    /// Returns `None` if cancelled.
    ///
    /// Newly observed finalized checkpoints are persisted.
    /// Epochs before the finalized one are fully finalized.
    async fn refresh_finality(
        &self,
        finalized: &mut Option<Epoch>,
    ) -> Result<Option<FinalizedCheckpoint>> {
        let checkpoint = match self.fetcher.finalized_checkpoint().await {
            Ok(checkpoint) => checkpoint,
            Err(FetchError::Cancelled { .. }) => return Ok(None),
            Err(error) => return Err(error).context("failed to fetch finalized checkpoint"),
        };

        let FinalizedCheckpoint { epoch, end_slot, .. } = checkpoint;

        if !finalized.is_some_and(|finalized| finalized >= epoch) {
            info_with_progress!("finalized checkpoint at epoch {epoch}, ending at slot {end_slot}");

            self.sink
                .persist(RecordBatch::FinalizedCheckpoints(vec![checkpoint]))
                .await
                .with_context(|| {
                    format!("failed to persist finalized checkpoint of epoch {epoch}")
                })?;

            *finalized = Some(epoch);
        }

        Ok(Some(checkpoint))
    }
}

fn finish(joined: Result<Result<()>, JoinError>) -> Result<()> {
    joined.context("state download panicked")?
}
