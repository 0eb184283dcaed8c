//! Rows handed to the persistence sink.

use crate::{
    nonstandard::ValidatorStatus,
    primitives::{Epoch, Gwei, PublicKeyBytes, Slot, ValidatorIndex, H256},
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ProposerDutyRecord {
    pub validator_index: ValidatorIndex,
    pub slot: Slot,
    pub proposed: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ValidatorLastStatus {
    pub validator_index: ValidatorIndex,
    pub epoch: Epoch,
    pub balance: Gwei,
    pub effective_balance: Gwei,
    pub status: ValidatorStatus,
    pub slashed: bool,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
    pub withdrawable_epoch: Epoch,
    pub pubkey: PublicKeyBytes,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ValidatorRewards {
    pub validator_index: ValidatorIndex,
    pub epoch: Epoch,
    pub balance: Gwei,
    pub reward: i64,
    pub max_reward: Gwei,
    pub max_attestation_reward: Gwei,
    pub max_sync_committee_reward: Gwei,
    pub base_reward: Gwei,
    pub in_sync_committee: bool,
    pub missing_source: bool,
    pub missing_target: bool,
    pub missing_head: bool,
    pub status: ValidatorStatus,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct EpochSummary {
    pub epoch: Epoch,
    pub slot: Slot,
    pub num_validators: u64,
    pub num_active: u64,
    pub num_slashed: u64,
    pub num_exited: u64,
    pub num_in_activation: u64,
    pub num_attesting_validators: u64,
    pub total_balance: Gwei,
    pub total_effective_balance: Gwei,
    pub attesting_effective_balance: Gwei,
    pub missing_source: u64,
    pub missing_target: u64,
    pub missing_head: u64,
    pub missed_blocks: u64,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct PoolSummary {
    pub pool: String,
    pub epoch: Epoch,
    pub num_validators: u64,
    pub num_active: u64,
    pub total_balance: Gwei,
    pub total_effective_balance: Gwei,
    pub missing_source: u64,
    pub missing_target: u64,
    pub missing_head: u64,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FinalizedCheckpoint {
    pub epoch: Epoch,
    pub block_root: H256,
    pub end_slot: Slot,
    pub end_state_root: H256,
}
