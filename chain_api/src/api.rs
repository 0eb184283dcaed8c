use std::sync::Arc;

use async_trait::async_trait;
use types::{
    combined::VersionedBeaconState,
    containers::{Finality, ProposerDuty, TransactionReceipt},
    primitives::{Epoch, Slot, H256},
};

use crate::error::ApiError;

/// Requests served by the upstream beacon and execution nodes.
///
/// `Ok(None)` means the endpoint answered without a body.
#[async_trait]
pub trait ChainApi: Send + Sync {
    async fn beacon_state(&self, slot: Slot) -> Result<Option<VersionedBeaconState>, ApiError>;

    async fn state_root(&self, slot: Slot) -> Result<Option<H256>, ApiError>;

    async fn proposer_duties(&self, epoch: Epoch) -> Result<Option<Vec<ProposerDuty>>, ApiError>;

    async fn finality(&self, state_id: &str) -> Result<Option<Finality>, ApiError>;

    async fn transaction_receipt(
        &self,
        transaction_hash: H256,
    ) -> Result<Option<TransactionReceipt>, ApiError>;
}

#[async_trait]
impl<A: ChainApi + ?Sized> ChainApi for Arc<A> {
    async fn beacon_state(&self, slot: Slot) -> Result<Option<VersionedBeaconState>, ApiError> {
        self.as_ref().beacon_state(slot).await
    }

    async fn state_root(&self, slot: Slot) -> Result<Option<H256>, ApiError> {
        self.as_ref().state_root(slot).await
    }

    async fn proposer_duties(&self, epoch: Epoch) -> Result<Option<Vec<ProposerDuty>>, ApiError> {
        self.as_ref().proposer_duties(epoch).await
    }

    async fn finality(&self, state_id: &str) -> Result<Option<Finality>, ApiError> {
        self.as_ref().finality(state_id).await
    }

    async fn transaction_receipt(
        &self,
        transaction_hash: H256,
    ) -> Result<Option<TransactionReceipt>, ApiError> {
        self.as_ref().transaction_receipt(transaction_hash).await
    }
}
