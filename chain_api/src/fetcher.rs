use core::future::Future;
use std::sync::Arc;

use acquire_book::{AcquireBook, Acquisition};
use helper_functions::misc;
use log::{debug, info};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use types::{
    containers::{Finality, ProposerDuty, TransactionReceipt},
    primitives::{Epoch, Slot, H256},
    records::FinalizedCheckpoint,
    state::AgnosticState,
};

use crate::{
    api::ChainApi,
    decode::decode_state,
    error::FetchError,
    retry::{retry, RetryPolicy},
};

type Book<T> = Arc<AcquireBook<Result<T, FetchError>>>;

/// Retrying, deduplicating front of a [`ChainApi`].
///
/// Concurrent requests for the same resource share a single upstream call and its outcome.
pub struct ResilientFetcher<A> {
    api: A,
    policy: RetryPolicy,
    token: CancellationToken,
    states: Book<Arc<AgnosticState>>,
    state_roots: Book<H256>,
    proposer_duties: Book<Vec<ProposerDuty>>,
    finality: Book<Finality>,
    receipts: Book<TransactionReceipt>,
}

impl<A: ChainApi> ResilientFetcher<A> {
    #[must_use]
    pub fn new(api: A, policy: RetryPolicy, token: CancellationToken) -> Self {
        Self {
            api,
            policy,
            token,
            states: Arc::new(AcquireBook::new("states")),
            state_roots: Arc::new(AcquireBook::new("state roots")),
            proposer_duties: Arc::new(AcquireBook::new("proposer duties")),
            finality: Arc::new(AcquireBook::new("finality")),
            receipts: Arc::new(AcquireBook::new("receipts")),
        }
    }

    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Downloads and decodes the state at `slot` together with its root and proposer duties.
    pub async fn fetch_state(&self, slot: Slot) -> Result<Arc<AgnosticState>, FetchError> {
        let key = format!("state={slot}");

        deduplicated(&self.states, key.clone(), || async {
            let start = Instant::now();

            let state =
                retry(self.policy, &key, &self.token, || self.api.beacon_state(slot)).await?;
            let state_root = self.state_root(slot).await?;
            let duties = self
                .proposer_duties(misc::compute_epoch_at_slot(slot))
                .await?;

            info!(
                "state at slot {slot} downloaded in {:.3} seconds",
                start.elapsed().as_secs_f64(),
            );

            decode_state(state, state_root, duties)
                .map(Arc::new)
                .map_err(|error| FetchError::decode(&key, &error))
        })
        .await
    }

    pub async fn state_root(&self, slot: Slot) -> Result<H256, FetchError> {
        let key = format!("stateroot={slot}");

        deduplicated(&self.state_roots, key.clone(), || {
            retry(self.policy, &key, &self.token, || self.api.state_root(slot))
        })
        .await
    }

    pub async fn proposer_duties(&self, epoch: Epoch) -> Result<Vec<ProposerDuty>, FetchError> {
        let key = format!("duties={epoch}");

        deduplicated(&self.proposer_duties, key.clone(), || {
            retry(self.policy, &key, &self.token, || {
                self.api.proposer_duties(epoch)
            })
        })
        .await
    }

    pub async fn finality(&self, state_id: &str) -> Result<Finality, FetchError> {
        let key = format!("finality={state_id}");

        deduplicated(&self.finality, key.clone(), || {
            retry(self.policy, &key, &self.token, || self.api.finality(state_id))
        })
        .await
    }

    /// Latest finalized checkpoint as seen from the head, with the last slot before it.
    ///
    /// Finalized checkpoints point at the first slot of an epoch,
    /// so the last fully finalized end-of-epoch state is the one right before it.
    pub async fn finalized_checkpoint(&self) -> Result<FinalizedCheckpoint, FetchError> {
        let finalized = self.finality("head").await?.finalized;
        let end_slot = misc::compute_start_slot_at_epoch(finalized.epoch).saturating_sub(1);
        let end_state_root = self.state_root(end_slot).await?;

        debug!(
            "finalized checkpoint at epoch {} ends at slot {end_slot}",
            finalized.epoch,
        );

        Ok(FinalizedCheckpoint {
            epoch: finalized.epoch,
            block_root: finalized.root,
            end_slot,
            end_state_root,
        })
    }

    pub async fn transaction_receipt(
        &self,
        transaction_hash: H256,
    ) -> Result<TransactionReceipt, FetchError> {
        let key = format!("txreceipt={transaction_hash:?}");

        deduplicated(&self.receipts, key.clone(), || {
            retry(self.policy, &key, &self.token, || {
                self.api.transaction_receipt(transaction_hash)
            })
        })
        .await
    }

    /// Whether no request of any kind is in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.states.is_empty()
            && self.state_roots.is_empty()
            && self.proposer_duties.is_empty()
            && self.finality.is_empty()
            && self.receipts.is_empty()
    }
}

async fn deduplicated<T, F, Fut>(book: &Book<T>, key: String, fetch: F) -> Result<T, FetchError>
where
    T: Clone + Send + Sync + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    match book.acquire(key).await {
        Acquisition::Holder(page) => {
            let outcome = fetch().await;
            page.publish(outcome.clone());
            outcome
        }
        Acquisition::Follower(outcome) => outcome,
    }
}
