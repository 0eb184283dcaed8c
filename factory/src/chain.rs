use core::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chain_api::{ApiError, ChainApi};
use helper_functions::misc;
use parking_lot::Mutex;
use types::{
    combined::VersionedBeaconState,
    containers::{Checkpoint, Finality, ProposerDuty, TransactionReceipt},
    nonstandard::Phase,
    primitives::{Epoch, Slot, H256},
};

use crate::states;

/// Scripted upstream node.
///
/// Requests are identified by the same keys the fetcher uses (`state=95`, `txreceipt=0x..`).
/// Failures registered with [`MockChainApi::fail`] are returned in order before the request succeeds.
pub struct MockChainApi {
    phase: Phase,
    validator_count: usize,
    finalized_epoch: AtomicU64,
    state_delays: HashMap<Slot, Duration>,
    missed_slots: Vec<Slot>,
    failures: Mutex<HashMap<String, VecDeque<ApiError>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockChainApi {
    #[must_use]
    pub fn new(phase: Phase, validator_count: usize) -> Self {
        Self {
            phase,
            validator_count,
            finalized_epoch: AtomicU64::new(0),
            state_delays: HashMap::new(),
            missed_slots: vec![],
            failures: Mutex::default(),
            calls: Mutex::default(),
        }
    }

    #[must_use]
    pub fn with_finalized_epoch(self, finalized_epoch: Epoch) -> Self {
        self.set_finalized_epoch(finalized_epoch);
        self
    }

    /// Delays responses for the state at `slot`.
    #[must_use]
    pub fn with_state_delay(mut self, slot: Slot, delay: Duration) -> Self {
        self.state_delays.insert(slot, delay);
        self
    }

    #[must_use]
    pub fn with_missed_slots(mut self, missed_slots: impl IntoIterator<Item = Slot>) -> Self {
        self.missed_slots = missed_slots.into_iter().collect();
        self
    }

    pub fn set_finalized_epoch(&self, finalized_epoch: Epoch) {
        self.finalized_epoch.store(finalized_epoch, Ordering::SeqCst);
    }

    pub fn fail(&self, key: impl Into<String>, errors: impl IntoIterator<Item = ApiError>) {
        self.failures
            .lock()
            .entry(key.into())
            .or_default()
            .extend(errors);
    }

    #[must_use]
    pub fn calls(&self, key: &str) -> usize {
        self.calls.lock().get(key).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn total_calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(_, calls)| calls)
            .sum()
    }

    fn record(&self, key: String) -> Result<(), ApiError> {
        let failure = self
            .failures
            .lock()
            .get_mut(&key)
            .and_then(VecDeque::pop_front);

        *self.calls.lock().entry(key).or_default() += 1;

        failure.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl ChainApi for MockChainApi {
    async fn beacon_state(&self, slot: Slot) -> Result<Option<VersionedBeaconState>, ApiError> {
        self.record(format!("state={slot}"))?;

        if let Some(delay) = self.state_delays.get(&slot) {
            tokio::time::sleep(*delay).await;
        }

        Ok(Some(states::beacon_state(
            self.phase,
            slot,
            self.validator_count,
            &self.missed_slots,
        )))
    }

    async fn state_root(&self, slot: Slot) -> Result<Option<H256>, ApiError> {
        self.record(format!("stateroot={slot}"))?;
        Ok(Some(states::state_root(slot)))
    }

    async fn proposer_duties(&self, epoch: Epoch) -> Result<Option<Vec<ProposerDuty>>, ApiError> {
        self.record(format!("duties={epoch}"))?;
        Ok(Some(states::proposer_duties(epoch, self.validator_count)))
    }

    async fn finality(&self, state_id: &str) -> Result<Option<Finality>, ApiError> {
        self.record(format!("finality={state_id}"))?;

        let finalized_epoch = self.finalized_epoch.load(Ordering::SeqCst);

        let checkpoint = |epoch: Epoch| Checkpoint {
            epoch,
            root: H256::from_low_u64_be(misc::compute_start_slot_at_epoch(epoch) + 1),
        };

        Ok(Some(Finality {
            previous_justified: checkpoint(finalized_epoch + 1),
            current_justified: checkpoint(finalized_epoch + 2),
            finalized: checkpoint(finalized_epoch),
        }))
    }

    async fn transaction_receipt(
        &self,
        transaction_hash: H256,
    ) -> Result<Option<TransactionReceipt>, ApiError> {
        self.record(format!("txreceipt={transaction_hash:?}"))?;

        Ok(Some(TransactionReceipt {
            transaction_hash,
            gas_used: 21_000,
            effective_gas_price: 1_000_000_000,
            contract_address: None,
        }))
    }
}
