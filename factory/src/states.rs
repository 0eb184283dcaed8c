use anyhow::Result;
use helper_functions::misc;
use types::{
    combined::VersionedBeaconState,
    consts::{FAR_FUTURE_EPOCH, SLOTS_PER_EPOCH},
    containers::{ProposerDuty, Validator},
    nonstandard::Phase,
    primitives::{Epoch, Gwei, PublicKeyBytes, Slot, H256},
    state::AgnosticState,
};

pub const MAX_EFFECTIVE_BALANCE: Gwei = 32_000_000_000;

/// Amount every balance grows by per epoch.
pub const BALANCE_GROWTH: Gwei = 10_000;

const BLOCK_ROOTS_LENGTH: u64 = 4 * SLOTS_PER_EPOCH;

/// State at `slot` with `validator_count` active validators that all attested on time.
///
/// Slots in `missed_slots` repeat the block root of the slot before them.
#[must_use]
pub fn beacon_state(
    phase: Phase,
    slot: Slot,
    validator_count: usize,
    missed_slots: &[Slot],
) -> VersionedBeaconState {
    let epoch = misc::compute_epoch_at_slot(slot);

    let validators = (0..validator_count)
        .map(|index| Validator {
            pubkey: PublicKeyBytes::from_low_u64_be(index as u64),
            effective_balance: MAX_EFFECTIVE_BALANCE,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
            ..Validator::default()
        })
        .collect();

    let start = slot.saturating_sub(BLOCK_ROOTS_LENGTH);
    let mut block_roots = vec![H256::zero(); BLOCK_ROOTS_LENGTH as usize];
    let mut root = H256::from_low_u64_be(start);

    for past_slot in start..slot {
        if past_slot == 0 || !missed_slots.contains(&past_slot) {
            root = H256::from_low_u64_be(past_slot + 1);
        }

        block_roots[(past_slot % BLOCK_ROOTS_LENGTH) as usize] = root;
    }

    VersionedBeaconState {
        phase,
        slot,
        validators,
        balances: vec![MAX_EFFECTIVE_BALANCE + epoch * BALANCE_GROWTH; validator_count],
        block_roots,
        previous_epoch_participation: vec![0b111; validator_count],
        current_sync_committee: (0..validator_count as u64).step_by(2).collect(),
    }
}

#[must_use]
pub fn state_root(slot: Slot) -> H256 {
    H256::from_low_u64_le(slot + 1)
}

/// One duty per slot of `epoch`, assigned round robin.
#[must_use]
pub fn proposer_duties(epoch: Epoch, validator_count: usize) -> Vec<ProposerDuty> {
    let validator_count = (validator_count as u64).max(1);

    misc::slots_in_epoch(epoch)
        .map(|slot| ProposerDuty {
            validator_index: slot % validator_count,
            slot,
        })
        .collect()
}

/// Decoded end-of-epoch state for `epoch`.
pub fn state(phase: Phase, epoch: Epoch, validator_count: usize) -> Result<AgnosticState> {
    state_with_missed_slots(phase, epoch, validator_count, &[])
}

pub fn state_with_missed_slots(
    phase: Phase,
    epoch: Epoch,
    validator_count: usize,
    missed_slots: &[Slot],
) -> Result<AgnosticState> {
    let slot = misc::compute_end_slot_at_epoch(epoch);

    let state = chain_api::decode_state(
        beacon_state(phase, slot, validator_count, missed_slots),
        state_root(slot),
        proposer_duties(epoch, validator_count),
    )?;

    Ok(state)
}
